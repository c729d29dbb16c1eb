//! 通用仓储模块
//!
//! 为实现了 [`Model`](crate::model::Model) 契约的文档类型提供CRUD、
//! 过滤查询、分页、稀疏字段级更新和原子upsert能力。
//! 仓储自身不持有可变状态，并发调用由驱动的连接池仲裁

use crate::config::MongoDbSettings;
use crate::connection::MongoConnection;
use crate::error::{EasyMongoError, EasyMongoResult};
use crate::filter::{
    build_filter_document, build_id_filter, build_projection_document, build_sort_document,
    coerce_id_value, map_field_name,
};
use crate::model::Model;
use crate::types::{
    Changeset, PagedResult, PaginationConfig, Projection, QueryCondition, QueryConditionGroup,
    QueryOptions, SortConfig,
};
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{CountOptions, FindOptions, UpdateOptions};
use rat_logger::{debug, warn};
use serde::de::DeserializeOwned;

/// upsert操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 没有匹配的文档，执行了插入
    Inserted,
    /// 匹配到已有文档，执行了更新
    Updated,
}

impl UpsertOutcome {
    /// 判断是否执行了插入
    pub fn was_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

/// MongoDB通用仓储
///
/// 每个文档类型对应一个集合（集合名由 `T::collection_name()` 决定）
pub struct MongoRepository<T: Model> {
    connection: MongoConnection,
    collection: Collection<T>,
}

impl<T: Model> Clone for MongoRepository<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            collection: self.collection.clone(),
        }
    }
}

impl<T: Model> MongoRepository<T> {
    /// 从连接配置建立仓储
    pub async fn connect(settings: MongoDbSettings) -> EasyMongoResult<Self> {
        let connection = MongoConnection::connect(settings).await?;
        Ok(Self::new(connection))
    }

    /// 在已有连接上创建仓储
    ///
    /// 连接可以廉价克隆，多个文档类型的仓储共享同一个客户端
    pub fn new(connection: MongoConnection) -> Self {
        let collection = connection.collection::<T>(&T::collection_name());
        Self {
            connection,
            collection,
        }
    }

    /// 获取底层连接
    pub fn connection(&self) -> &MongoConnection {
        &self.connection
    }

    /// 确认与服务器的连通性
    pub async fn ping(&self) -> EasyMongoResult<()> {
        self.connection.ping().await
    }

    /// 分页获取集合中的所有文档
    pub async fn get_all(&self, page: u64, page_size: u64) -> EasyMongoResult<PagedResult<T>> {
        self.get_all_filtered(&[], page, page_size, &[]).await
    }

    /// 分页获取匹配条件的文档
    ///
    /// 页码从1开始，0会被钳制为1；`total_count` 统计跨所有页的匹配总数
    pub async fn get_all_filtered(
        &self,
        groups: &[QueryConditionGroup],
        page: u64,
        page_size: u64,
        sort: &[SortConfig],
    ) -> EasyMongoResult<PagedResult<T>> {
        let filter = build_filter_document(groups)?;
        let pagination = PaginationConfig::from_page(page, page_size);

        let mut options = FindOptions::default();
        options.skip = Some(pagination.skip);
        options.limit = Some(pagination.limit as i64);
        if !sort.is_empty() {
            options.sort = Some(build_sort_document(sort));
        }

        debug!(
            "[{}] 分页查询: page={} page_size={} filter={:?}",
            T::collection_name(),
            page.max(1),
            page_size,
            filter
        );

        let items: Vec<T> = self
            .collection
            .find(filter.clone(), options)
            .await?
            .try_collect()
            .await?;
        let total_count = self.collection.count_documents(filter, None).await?;

        Ok(PagedResult::new(items, total_count, page, page_size))
    }

    /// 按查询选项（排序、分页）获取匹配条件的文档
    pub async fn find_with_options(
        &self,
        groups: &[QueryConditionGroup],
        options: &QueryOptions,
    ) -> EasyMongoResult<Vec<T>> {
        let filter = build_filter_document(groups)?;

        let mut find_options = FindOptions::default();
        if !options.sort.is_empty() {
            find_options.sort = Some(build_sort_document(&options.sort));
        }
        if let Some(pagination) = &options.pagination {
            find_options.skip = Some(pagination.skip);
            find_options.limit = Some(pagination.limit as i64);
        }

        let items = self
            .collection
            .find(filter, find_options)
            .await?
            .try_collect()
            .await?;
        Ok(items)
    }

    /// 获取匹配条件的全部文档（不分页）
    pub async fn filter_by(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Vec<T>> {
        let filter = build_filter_document(groups)?;
        debug!("[{}] 过滤查询: {:?}", T::collection_name(), filter);

        let items = self
            .collection
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(items)
    }

    /// 投影查询：只取部分字段，结果反序列化为调用方指定的派生类型
    ///
    /// 投影字段在发往驱动之前按模型声明的字段集合校验，
    /// 引用未声明字段返回校验错误
    pub async fn filter_by_projected<P>(
        &self,
        groups: &[QueryConditionGroup],
        projection: &Projection,
    ) -> EasyMongoResult<Vec<P>>
    where
        P: DeserializeOwned + Send + Sync + Unpin,
    {
        let filter = build_filter_document(groups)?;
        let projection_doc = build_projection_document(projection, T::field_names())?;

        let mut options = FindOptions::default();
        options.projection = Some(projection_doc);

        let items = self
            .collection
            .clone_with_type::<P>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(items)
    }

    /// 查找第一个匹配的文档，不存在时返回None
    pub async fn find_one(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Option<T>> {
        let filter = build_filter_document(groups)?;
        let result = self.collection.find_one(filter, None).await?;
        Ok(result)
    }

    /// 按标识查找文档
    ///
    /// 格式不合法的标识按字面值匹配，自然返回None而不是报错
    pub async fn find_by_id(&self, id: &str) -> EasyMongoResult<Option<T>> {
        let result = self.collection.find_one(build_id_filter(id), None).await?;
        Ok(result)
    }

    /// 按任意字段的等值匹配查找文档
    pub async fn find_by_field<V: Into<Bson>>(
        &self,
        field: &str,
        value: V,
    ) -> EasyMongoResult<Option<T>> {
        let condition = QueryCondition::eq(field, value);
        self.find_one(&[condition.into()]).await
    }

    /// 查找预期至多一个匹配的文档
    ///
    /// 匹配到多个时返回第一个并记录告警日志
    pub async fn find_single(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Option<T>> {
        let filter = build_filter_document(groups)?;

        let mut options = FindOptions::default();
        options.limit = Some(2);

        let items: Vec<T> = self
            .collection
            .find(filter.clone(), options)
            .await?
            .try_collect()
            .await?;

        if items.len() > 1 {
            warn!(
                "[{}] find_single匹配到多个文档，返回第一个: {:?}",
                T::collection_name(),
                filter
            );
        }

        Ok(items.into_iter().next())
    }

    /// 插入单个文档
    ///
    /// 标识由调用方在创建时赋值；标识冲突返回重复键错误
    pub async fn insert_one(&self, entity: &T) -> EasyMongoResult<()> {
        self.collection.insert_one(entity, None).await?;
        debug!("[{}] 插入文档: {}", T::collection_name(), entity.id());
        Ok(())
    }

    /// 批量插入文档
    pub async fn insert_many(&self, entities: &[T]) -> EasyMongoResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        self.collection.insert_many(entities, None).await?;
        debug!(
            "[{}] 批量插入 {} 个文档",
            T::collection_name(),
            entities.len()
        );
        Ok(())
    }

    /// 按标识整体替换文档
    ///
    /// 返回是否发生了替换：没有匹配的文档时静默返回false
    pub async fn replace_one(&self, entity: &T) -> EasyMongoResult<bool> {
        let filter = build_id_filter(entity.id());
        let previous = self
            .collection
            .find_one_and_replace(filter, entity, None)
            .await?;
        Ok(previous.is_some())
    }

    /// 按标识应用稀疏更新
    ///
    /// 更新集来自 `to_update_document()`：内存实例中缺席的字段被整体省略，
    /// 存储中的对应字段保持原值。返回是否匹配到文档
    pub async fn update(&self, entity: &T) -> EasyMongoResult<bool> {
        let sparse = entity.to_update_document()?;
        if sparse.is_empty() {
            return Ok(false);
        }

        let result = self
            .collection
            .update_one(build_id_filter(entity.id()), doc! { "$set": sparse }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    /// 按指定字段的等值匹配应用稀疏更新
    ///
    /// 匹配值取自实体对应字段的当前取值；
    /// 该字段在实体中缺席（`None`）时无法定位目标，返回校验错误
    pub async fn update_by_field(&self, field: &str, entity: &T) -> EasyMongoResult<bool> {
        let sparse = entity.to_update_document()?;

        let filter = if field == "id" || field == "_id" {
            build_id_filter(entity.id())
        } else {
            let value = sparse
                .get(field)
                .ok_or_else(|| EasyMongoError::ValidationError {
                    field: field.to_string(),
                    message: "匹配字段在实体中没有取值".to_string(),
                })?
                .clone();
            let mut filter = Document::new();
            filter.insert(map_field_name(field), value);
            filter
        };

        if sparse.is_empty() {
            return Ok(false);
        }

        let result = self
            .collection
            .update_one(filter, doc! { "$set": sparse }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    /// 在匹配条件的文档上设置单个字段
    pub async fn update_field<V: Into<Bson>>(
        &self,
        groups: &[QueryConditionGroup],
        field: &str,
        value: V,
    ) -> EasyMongoResult<bool> {
        if !T::field_names().contains(&field) {
            return Err(EasyMongoError::ValidationError {
                field: field.to_string(),
                message: "更新引用了模型未声明的字段".to_string(),
            });
        }
        if field == "id" || field == "_id" {
            return Err(EasyMongoError::ValidationError {
                field: field.to_string(),
                message: "标识字段不可变".to_string(),
            });
        }

        let filter = build_filter_document(groups)?;
        let mut set_doc = Document::new();
        set_doc.insert(map_field_name(field), value.into());
        let result = self
            .collection
            .update_one(filter, doc! { "$set": set_doc }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    /// 将显式更新集应用到所有匹配的文档
    ///
    /// 返回匹配的文档数量
    pub async fn apply(
        &self,
        groups: &[QueryConditionGroup],
        changeset: &Changeset,
    ) -> EasyMongoResult<u64> {
        if changeset.is_empty() {
            return Err(EasyMongoError::ValidationError {
                field: String::new(),
                message: "更新集不能为空".to_string(),
            });
        }
        changeset.validate_against(T::field_names())?;

        let filter = build_filter_document(groups)?;
        let update = changeset.clone().into_update_document();
        let result = self.collection.update_many(filter, update, None).await?;

        debug!(
            "[{}] 批量更新: matched={} modified={}",
            T::collection_name(),
            result.matched_count,
            result.modified_count
        );
        Ok(result.matched_count)
    }

    /// 删除第一个匹配的文档，返回是否发生了删除
    pub async fn delete_one(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<bool> {
        let filter = build_filter_document(groups)?;
        let result = self.collection.delete_one(filter, None).await?;
        Ok(result.deleted_count > 0)
    }

    /// 按标识删除文档，零匹配不是错误
    pub async fn delete_by_id(&self, id: &str) -> EasyMongoResult<bool> {
        let result = self
            .collection
            .delete_one(build_id_filter(id), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    /// 删除所有匹配的文档，返回删除数量
    pub async fn delete_many(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<u64> {
        let filter = build_filter_document(groups)?;
        let result = self.collection.delete_many(filter, None).await?;
        debug!(
            "[{}] 批量删除 {} 个文档",
            T::collection_name(),
            result.deleted_count
        );
        Ok(result.deleted_count)
    }

    /// 原子的插入或更新
    ///
    /// 借助驱动的upsert选项在服务端完成"不存在则插入、存在则更新"，
    /// 同一键上的并发upsert由服务端仲裁，从不产生重复文档。
    /// 插入分支的标识通过 `$setOnInsert` 取自实体自身
    pub async fn upsert(
        &self,
        groups: &[QueryConditionGroup],
        entity: &T,
    ) -> EasyMongoResult<UpsertOutcome> {
        let filter = build_filter_document(groups)?;
        let sparse = entity.to_update_document()?;
        let update = doc! {
            "$set": sparse,
            "$setOnInsert": doc! {
                "_id": coerce_id_value(&Bson::String(entity.id().to_string())),
            },
        };
        self.upsert_with(filter, update).await
    }

    /// 按标识的原子插入或更新
    pub async fn upsert_by_id(&self, id: &str, entity: &T) -> EasyMongoResult<UpsertOutcome> {
        let filter = build_id_filter(id);
        let sparse = entity.to_update_document()?;
        self.upsert_with(filter, doc! { "$set": sparse }).await
    }

    async fn upsert_with(
        &self,
        filter: Document,
        update: Document,
    ) -> EasyMongoResult<UpsertOutcome> {
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self.collection.update_one(filter, update, options).await?;

        if result.upserted_id.is_some() {
            debug!("[{}] upsert执行了插入", T::collection_name());
            Ok(UpsertOutcome::Inserted)
        } else {
            debug!("[{}] upsert执行了更新", T::collection_name());
            Ok(UpsertOutcome::Updated)
        }
    }

    /// 统计匹配条件的文档数量
    pub async fn count(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<u64> {
        let filter = build_filter_document(groups)?;
        let count = self.collection.count_documents(filter, None).await?;
        Ok(count)
    }

    /// 判断是否存在匹配条件的文档
    pub async fn exists(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<bool> {
        let filter = build_filter_document(groups)?;

        let mut options = CountOptions::default();
        options.limit = Some(1);

        let count = self
            .collection
            .count_documents(filter, options)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_outcome_flags() {
        assert!(UpsertOutcome::Inserted.was_inserted());
        assert!(!UpsertOutcome::Updated.was_inserted());
    }
}
