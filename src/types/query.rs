//! 查询条件类型定义
//!
//! 谓词与投影的结构化表达，由过滤器构建模块翻译为MongoDB查询文档

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// 查询条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    /// 字段名
    pub field: String,
    /// 操作符
    pub operator: QueryOperator,
    /// 值
    pub value: Bson,
}

impl QueryCondition {
    /// 创建新的查询条件
    pub fn new<S: Into<String>, V: Into<Bson>>(field: S, operator: QueryOperator, value: V) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// 创建等于条件
    pub fn eq<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Eq, value)
    }

    /// 创建不等于条件
    pub fn ne<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Ne, value)
    }

    /// 创建大于条件
    pub fn gt<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Gt, value)
    }

    /// 创建大于等于条件
    pub fn gte<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Gte, value)
    }

    /// 创建小于条件
    pub fn lt<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Lt, value)
    }

    /// 创建小于等于条件
    pub fn lte<S: Into<String>, V: Into<Bson>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Lte, value)
    }

    /// 创建包含条件（字符串子串匹配）
    pub fn contains<S: Into<String>, V: Into<String>>(field: S, value: V) -> Self {
        Self::new(field, QueryOperator::Contains, Bson::String(value.into()))
    }

    /// 创建在列表中条件
    pub fn in_list<S: Into<String>, V: Into<Bson>>(field: S, values: Vec<V>) -> Self {
        let array: Vec<Bson> = values.into_iter().map(Into::into).collect();
        Self::new(field, QueryOperator::In, Bson::Array(array))
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// AND 逻辑
    And,
    /// OR 逻辑
    Or,
}

/// 查询条件组合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryConditionGroup {
    /// 单个条件
    Single(QueryCondition),
    /// 条件组合
    Group {
        /// 逻辑操作符
        operator: LogicalOperator,
        /// 子条件列表
        conditions: Vec<QueryConditionGroup>,
    },
}

impl From<QueryCondition> for QueryConditionGroup {
    fn from(condition: QueryCondition) -> Self {
        QueryConditionGroup::Single(condition)
    }
}

/// 查询操作符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryOperator {
    /// 等于
    Eq,
    /// 不等于
    Ne,
    /// 大于
    Gt,
    /// 大于等于
    Gte,
    /// 小于
    Lt,
    /// 小于等于
    Lte,
    /// 包含（字符串）
    Contains,
    /// 开始于（字符串）
    StartsWith,
    /// 结束于（字符串）
    EndsWith,
    /// 在列表中
    In,
    /// 不在列表中
    NotIn,
    /// 正则表达式匹配
    Regex,
    /// 存在（字段存在）
    Exists,
    /// 为空
    IsNull,
    /// 不为空
    IsNotNull,
}

/// 排序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    /// 字段名
    pub field: String,
    /// 排序方向
    pub direction: SortDirection,
}

impl SortConfig {
    /// 创建升序排序
    pub fn asc<S: Into<String>>(field: S) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// 创建降序排序
    pub fn desc<S: Into<String>>(field: S) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortDirection {
    /// 升序
    Asc,
    /// 降序
    Desc,
}

/// 分页配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// 跳过的记录数
    pub skip: u64,
    /// 限制返回的记录数
    pub limit: u64,
}

impl PaginationConfig {
    /// 从1起始的页码和页大小计算跳过/限制数量
    pub fn from_page(page: u64, page_size: u64) -> Self {
        let page = page.max(1);
        Self {
            skip: (page - 1) * page_size,
            limit: page_size,
        }
    }
}

/// 查询选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// 排序配置
    pub sort: Vec<SortConfig>,
    /// 分页配置
    pub pagination: Option<PaginationConfig>,
}

impl QueryOptions {
    /// 创建新的查询选项
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加排序配置
    pub fn sort_by(mut self, sort: SortConfig) -> Self {
        self.sort.push(sort);
        self
    }

    /// 设置分页配置
    pub fn paginate(mut self, page: u64, page_size: u64) -> Self {
        self.pagination = Some(PaginationConfig::from_page(page, page_size));
        self
    }
}

/// 字段投影
///
/// 只返回文档的部分字段，结果反序列化为调用方指定的派生类型
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Projection {
    /// 选择的字段列表
    pub fields: Vec<String>,
}

impl Projection {
    /// 创建新的投影
    pub fn new<S: Into<String>>(fields: Vec<S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_from_page() {
        let config = PaginationConfig::from_page(2, 10);
        assert_eq!(config.skip, 10);
        assert_eq!(config.limit, 10);
    }

    #[test]
    fn test_pagination_page_zero_clamped() {
        let config = PaginationConfig::from_page(0, 10);
        assert_eq!(config.skip, 0);
        assert_eq!(config.limit, 10);
    }

    #[test]
    fn test_condition_constructors() {
        let condition = QueryCondition::eq("name", "测试用户");
        assert_eq!(condition.field, "name");
        assert_eq!(condition.operator, QueryOperator::Eq);
        assert_eq!(condition.value, Bson::String("测试用户".to_string()));
    }

    #[test]
    fn test_in_list_builds_array() {
        let condition = QueryCondition::in_list("age", vec![18i32, 20, 22]);
        assert_eq!(condition.operator, QueryOperator::In);
        assert!(matches!(condition.value, Bson::Array(ref arr) if arr.len() == 3));
    }
}
