//! MongoDB过滤器构建模块
//!
//! 把结构化查询条件翻译为MongoDB查询文档，并负责投影文档的构建与校验

use crate::error::{EasyMongoError, EasyMongoResult};
use crate::types::{
    LogicalOperator, Projection, QueryCondition, QueryConditionGroup, QueryOperator, SortConfig,
    SortDirection,
};
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use rat_logger::debug;

/// MongoDB过滤器构建器
pub struct MongoFilterBuilder {
    conditions: Vec<QueryCondition>,
    condition_groups: Vec<QueryConditionGroup>,
}

impl MongoFilterBuilder {
    /// 创建新的过滤器构建器
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            condition_groups: Vec::new(),
        }
    }

    /// 添加单个条件
    pub fn where_condition(mut self, condition: QueryCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// 添加多个条件
    pub fn where_conditions(mut self, conditions: &[QueryCondition]) -> Self {
        self.conditions.extend_from_slice(conditions);
        self
    }

    /// 添加条件组合
    pub fn where_condition_groups(mut self, groups: &[QueryConditionGroup]) -> Self {
        self.condition_groups.extend_from_slice(groups);
        self
    }

    /// 构建MongoDB查询文档
    pub fn build(self) -> EasyMongoResult<Document> {
        let mut query_doc = Document::new();

        // 优先使用条件组合
        if !self.condition_groups.is_empty() {
            let groups_doc = self.build_condition_groups_document()?;
            if !groups_doc.is_empty() {
                query_doc.extend(groups_doc);
            }
        } else if !self.conditions.is_empty() {
            let conditions_doc = self.build_conditions_document()?;
            if !conditions_doc.is_empty() {
                query_doc.extend(conditions_doc);
            }
        }

        debug!("[MongoDB] 完成查询文档构建: {:?}", query_doc);
        Ok(query_doc)
    }

    /// 构建条件文档
    fn build_conditions_document(&self) -> EasyMongoResult<Document> {
        let mut query_doc = Document::new();

        for condition in &self.conditions {
            let condition_doc = self.build_single_condition_document(condition)?;
            if !condition_doc.is_empty() {
                query_doc.extend(condition_doc);
            }
        }

        Ok(query_doc)
    }

    /// 构建条件组合文档
    fn build_condition_groups_document(&self) -> EasyMongoResult<Document> {
        let mut group_docs = Vec::new();

        for group in &self.condition_groups {
            let group_doc = self.build_single_condition_group_document(group)?;
            if !group_doc.is_empty() {
                group_docs.push(group_doc);
            }
        }

        if group_docs.is_empty() {
            Ok(Document::new())
        } else if group_docs.len() == 1 {
            Ok(group_docs.into_iter().next().unwrap())
        } else {
            Ok(doc! { "$and": group_docs })
        }
    }

    /// 构建单个条件组合的文档
    fn build_single_condition_group_document(
        &self,
        group: &QueryConditionGroup,
    ) -> EasyMongoResult<Document> {
        match group {
            QueryConditionGroup::Single(condition) => {
                self.build_single_condition_document(condition)
            }
            QueryConditionGroup::Group {
                operator,
                conditions,
            } => {
                if conditions.is_empty() {
                    return Ok(Document::new());
                }

                let mut condition_docs = Vec::new();
                for condition in conditions {
                    let doc = self.build_single_condition_group_document(condition)?;
                    if !doc.is_empty() {
                        condition_docs.push(doc);
                    }
                }

                if condition_docs.is_empty() {
                    Ok(Document::new())
                } else if condition_docs.len() == 1 {
                    Ok(condition_docs.into_iter().next().unwrap())
                } else {
                    let operator_key = match operator {
                        LogicalOperator::And => "$and",
                        LogicalOperator::Or => "$or",
                    };
                    Ok(doc! { operator_key: condition_docs })
                }
            }
        }
    }

    /// 构建单个条件的文档
    fn build_single_condition_document(
        &self,
        condition: &QueryCondition,
    ) -> EasyMongoResult<Document> {
        let field_name = map_field_name(&condition.field);

        // 标识字段做ObjectId解析回退，其余字段使用调用方声明的BSON值
        let bson_value = if field_name == "_id" {
            coerce_id_value(&condition.value)
        } else {
            condition.value.clone()
        };

        debug!(
            "[MongoDB] 处理条件: {} {:?} {:?}",
            field_name, condition.operator, bson_value
        );

        let condition_doc = match condition.operator {
            QueryOperator::Eq => doc! { field_name: bson_value },
            QueryOperator::Ne => doc! { field_name: doc! { "$ne": bson_value } },
            QueryOperator::Gt => doc! { field_name: doc! { "$gt": bson_value } },
            QueryOperator::Gte => doc! { field_name: doc! { "$gte": bson_value } },
            QueryOperator::Lt => doc! { field_name: doc! { "$lt": bson_value } },
            QueryOperator::Lte => doc! { field_name: doc! { "$lte": bson_value } },
            QueryOperator::Contains => {
                let s = expect_string(&condition.field, &bson_value, "Contains")?;
                doc! { field_name: doc! { "$regex": format!(".*{}.*", regex::escape(&s)), "$options": "i" } }
            }
            QueryOperator::StartsWith => {
                let s = expect_string(&condition.field, &bson_value, "StartsWith")?;
                doc! { field_name: doc! { "$regex": format!("^{}", regex::escape(&s)), "$options": "i" } }
            }
            QueryOperator::EndsWith => {
                let s = expect_string(&condition.field, &bson_value, "EndsWith")?;
                doc! { field_name: doc! { "$regex": format!("{}$", regex::escape(&s)), "$options": "i" } }
            }
            QueryOperator::In => {
                if let Bson::Array(arr) = bson_value {
                    doc! { field_name: doc! { "$in": arr } }
                } else {
                    doc! { field_name: doc! { "$in": [bson_value] } }
                }
            }
            QueryOperator::NotIn => {
                if let Bson::Array(arr) = bson_value {
                    doc! { field_name: doc! { "$nin": arr } }
                } else {
                    doc! { field_name: doc! { "$nin": [bson_value] } }
                }
            }
            QueryOperator::Regex => {
                let s = expect_string(&condition.field, &bson_value, "Regex")?;
                doc! { field_name: doc! { "$regex": s, "$options": "i" } }
            }
            QueryOperator::Exists => {
                doc! { field_name: doc! { "$exists": true } }
            }
            QueryOperator::IsNull => {
                doc! { field_name: doc! { "$eq": Bson::Null } }
            }
            QueryOperator::IsNotNull => {
                doc! { field_name: doc! { "$ne": Bson::Null } }
            }
        };

        Ok(condition_doc)
    }
}

impl Default for MongoFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 要求条件值为字符串，否则返回校验错误
fn expect_string(field: &str, value: &Bson, operator: &str) -> EasyMongoResult<String> {
    if let Bson::String(s) = value {
        Ok(s.clone())
    } else {
        Err(EasyMongoError::ValidationError {
            field: field.to_string(),
            message: format!("{}操作符只支持字符串类型", operator),
        })
    }
}

/// 将调用方字段名映射到MongoDB字段名（id -> _id）
pub fn map_field_name(field_name: &str) -> String {
    if field_name == "id" {
        "_id".to_string()
    } else {
        field_name.to_string()
    }
}

/// 标识值的类型推断
///
/// 字符串能解析为ObjectId时按ObjectId匹配，否则按字面字符串匹配。
/// 格式不合法从不报错：按字面值查询自然匹配不到任何文档
pub fn coerce_id_value(value: &Bson) -> Bson {
    match value {
        Bson::String(id_str) => {
            if let Ok(object_id) = ObjectId::parse_str(id_str) {
                Bson::ObjectId(object_id)
            } else {
                Bson::String(id_str.clone())
            }
        }
        other => other.clone(),
    }
}

/// 构建标识字段的等值查询文档
pub fn build_id_filter(id: &str) -> Document {
    doc! { "_id": coerce_id_value(&Bson::String(id.to_string())) }
}

/// 构建条件组合查询文档的便捷函数
pub fn build_filter_document(groups: &[QueryConditionGroup]) -> EasyMongoResult<Document> {
    MongoFilterBuilder::new()
        .where_condition_groups(groups)
        .build()
}

/// 构建投影文档，并校验每个字段都在模型声明的字段集合内
pub fn build_projection_document(
    projection: &Projection,
    allowed_fields: &[&str],
) -> EasyMongoResult<Document> {
    if projection.fields.is_empty() {
        return Err(EasyMongoError::ValidationError {
            field: String::new(),
            message: "投影字段列表不能为空".to_string(),
        });
    }

    let mut projection_doc = Document::new();
    for field in &projection.fields {
        if !allowed_fields.contains(&field.as_str()) {
            return Err(EasyMongoError::ValidationError {
                field: field.clone(),
                message: "投影引用了模型未声明的字段".to_string(),
            });
        }
        projection_doc.insert(map_field_name(field), 1i32);
    }

    Ok(projection_doc)
}

/// 构建排序文档
pub fn build_sort_document(sort: &[SortConfig]) -> Document {
    let mut sort_doc = Document::new();
    for config in sort {
        let direction = match config.direction {
            SortDirection::Asc => 1i32,
            SortDirection::Desc => -1i32,
        };
        sort_doc.insert(map_field_name(&config.field), direction);
    }
    sort_doc
}
