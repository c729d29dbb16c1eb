//! easy_mongo - MongoDB通用仓储库
//!
//! 为满足最小形状契约的任意文档类型提供CRUD、过滤查询、分页、
//! 稀疏字段级更新和原子upsert能力，并附带可选的后台连接健康监控。
//! 连接管理、线协议和查询执行由 mongodb 驱动负责，
//! 本库只负责构建查询/投影/更新文档并把驱动结果包装为领域类型

// 导出所有公共模块
pub mod blocking;
pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod health;
pub mod model;
pub mod repository;
pub mod types;

// 重新导出常用类型和函数
pub use config::{CONFIG_SECTION, MongoDbSettings, MongoDbSettingsBuilder, MongoUriBuilder};
pub use connection::MongoConnection;
pub use error::{EasyMongoError, EasyMongoResult};
pub use filter::MongoFilterBuilder;
pub use health::{
    HealthMonitorOptions, HealthProbe, HealthState, HealthStatus, HealthStatusHandle,
    MongoHealthMonitor, PingProbe, RetryPolicy,
};
pub use model::Model;
pub use repository::{MongoRepository, UpsertOutcome};
pub use types::*;

// 日志系统导入
use rat_logger::info;

/// 初始化easy_mongo库
///
/// 注意：日志系统由调用者自行初始化，本库不再自动初始化日志
pub fn init() {
    info!("easy_mongo 初始化完成");
}
