//! 阻塞式仓储接口
//!
//! 为同步调用方提供与异步仓储逐一对应的阻塞方法。
//! 每个阻塞仓储持有自己的单线程运行时，在其上驱动异步实现完成；
//! 禁止在异步上下文内使用本模块，否则会因嵌套运行时而panic

use crate::config::MongoDbSettings;
use crate::error::{EasyMongoError, EasyMongoResult};
use crate::model::Model;
use crate::repository::{self, UpsertOutcome};
use crate::types::{
    Changeset, PagedResult, Projection, QueryConditionGroup, QueryOptions, SortConfig,
};
use mongodb::bson::Bson;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// 阻塞式MongoDB通用仓储
///
/// 克隆后共享同一个运行时和底层连接
pub struct MongoRepository<T: Model> {
    inner: repository::MongoRepository<T>,
    runtime: Arc<Runtime>,
}

impl<T: Model> Clone for MongoRepository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<T: Model> MongoRepository<T> {
    /// 从连接配置建立阻塞式仓储
    pub fn connect(settings: MongoDbSettings) -> EasyMongoResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EasyMongoError::ConfigError {
                message: format!("运行时创建失败: {}", e),
            })?;

        let inner = runtime.block_on(repository::MongoRepository::connect(settings))?;
        Ok(Self {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    /// 获取底层异步仓储
    pub fn as_async(&self) -> &repository::MongoRepository<T> {
        &self.inner
    }

    /// 确认与服务器的连通性
    pub fn ping(&self) -> EasyMongoResult<()> {
        self.runtime.block_on(self.inner.ping())
    }

    /// 分页获取集合中的所有文档
    pub fn get_all(&self, page: u64, page_size: u64) -> EasyMongoResult<PagedResult<T>> {
        self.runtime.block_on(self.inner.get_all(page, page_size))
    }

    /// 分页获取匹配条件的文档
    pub fn get_all_filtered(
        &self,
        groups: &[QueryConditionGroup],
        page: u64,
        page_size: u64,
        sort: &[SortConfig],
    ) -> EasyMongoResult<PagedResult<T>> {
        self.runtime
            .block_on(self.inner.get_all_filtered(groups, page, page_size, sort))
    }

    /// 按查询选项（排序、分页）获取匹配条件的文档
    pub fn find_with_options(
        &self,
        groups: &[QueryConditionGroup],
        options: &QueryOptions,
    ) -> EasyMongoResult<Vec<T>> {
        self.runtime
            .block_on(self.inner.find_with_options(groups, options))
    }

    /// 获取匹配条件的全部文档（不分页）
    pub fn filter_by(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Vec<T>> {
        self.runtime.block_on(self.inner.filter_by(groups))
    }

    /// 投影查询：只取部分字段，结果反序列化为调用方指定的派生类型
    pub fn filter_by_projected<P>(
        &self,
        groups: &[QueryConditionGroup],
        projection: &Projection,
    ) -> EasyMongoResult<Vec<P>>
    where
        P: DeserializeOwned + Send + Sync + Unpin,
    {
        self.runtime
            .block_on(self.inner.filter_by_projected(groups, projection))
    }

    /// 查找第一个匹配的文档
    pub fn find_one(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Option<T>> {
        self.runtime.block_on(self.inner.find_one(groups))
    }

    /// 按标识查找文档
    pub fn find_by_id(&self, id: &str) -> EasyMongoResult<Option<T>> {
        self.runtime.block_on(self.inner.find_by_id(id))
    }

    /// 按任意字段的等值匹配查找文档
    pub fn find_by_field<V: Into<Bson>>(&self, field: &str, value: V) -> EasyMongoResult<Option<T>> {
        self.runtime.block_on(self.inner.find_by_field(field, value))
    }

    /// 查找预期至多一个匹配的文档
    pub fn find_single(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<Option<T>> {
        self.runtime.block_on(self.inner.find_single(groups))
    }

    /// 插入单个文档
    pub fn insert_one(&self, entity: &T) -> EasyMongoResult<()> {
        self.runtime.block_on(self.inner.insert_one(entity))
    }

    /// 批量插入文档
    pub fn insert_many(&self, entities: &[T]) -> EasyMongoResult<()> {
        self.runtime.block_on(self.inner.insert_many(entities))
    }

    /// 按标识整体替换文档
    pub fn replace_one(&self, entity: &T) -> EasyMongoResult<bool> {
        self.runtime.block_on(self.inner.replace_one(entity))
    }

    /// 按标识应用稀疏更新
    pub fn update(&self, entity: &T) -> EasyMongoResult<bool> {
        self.runtime.block_on(self.inner.update(entity))
    }

    /// 按指定字段的等值匹配应用稀疏更新
    pub fn update_by_field(&self, field: &str, entity: &T) -> EasyMongoResult<bool> {
        self.runtime
            .block_on(self.inner.update_by_field(field, entity))
    }

    /// 在匹配条件的文档上设置单个字段
    pub fn update_field<V: Into<Bson>>(
        &self,
        groups: &[QueryConditionGroup],
        field: &str,
        value: V,
    ) -> EasyMongoResult<bool> {
        self.runtime
            .block_on(self.inner.update_field(groups, field, value))
    }

    /// 将显式更新集应用到所有匹配的文档
    pub fn apply(&self, groups: &[QueryConditionGroup], changeset: &Changeset) -> EasyMongoResult<u64> {
        self.runtime.block_on(self.inner.apply(groups, changeset))
    }

    /// 删除第一个匹配的文档
    pub fn delete_one(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<bool> {
        self.runtime.block_on(self.inner.delete_one(groups))
    }

    /// 按标识删除文档
    pub fn delete_by_id(&self, id: &str) -> EasyMongoResult<bool> {
        self.runtime.block_on(self.inner.delete_by_id(id))
    }

    /// 删除所有匹配的文档
    pub fn delete_many(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<u64> {
        self.runtime.block_on(self.inner.delete_many(groups))
    }

    /// 原子的插入或更新
    pub fn upsert(
        &self,
        groups: &[QueryConditionGroup],
        entity: &T,
    ) -> EasyMongoResult<UpsertOutcome> {
        self.runtime.block_on(self.inner.upsert(groups, entity))
    }

    /// 按标识的原子插入或更新
    pub fn upsert_by_id(&self, id: &str, entity: &T) -> EasyMongoResult<UpsertOutcome> {
        self.runtime.block_on(self.inner.upsert_by_id(id, entity))
    }

    /// 统计匹配条件的文档数量
    pub fn count(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<u64> {
        self.runtime.block_on(self.inner.count(groups))
    }

    /// 判断是否存在匹配条件的文档
    pub fn exists(&self, groups: &[QueryConditionGroup]) -> EasyMongoResult<bool> {
        self.runtime.block_on(self.inner.exists(groups))
    }
}
