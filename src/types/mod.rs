//! 通用类型定义
//!
//! 定义查询条件、分页结果和稀疏更新集等领域类型

pub mod changeset;
pub mod paged;
pub mod query;

// 重新导出所有公共类型以保持API兼容性
pub use changeset::Changeset;
pub use paged::PagedResult;
pub use query::{
    LogicalOperator, PaginationConfig, Projection, QueryCondition, QueryConditionGroup,
    QueryOperator, QueryOptions, SortConfig, SortDirection,
};
