//! MongoDB连接管理模块
//!
//! 负责从连接配置创建客户端、选择数据库和提供连通性探测

use crate::config::MongoDbSettings;
use crate::error::{EasyMongoError, EasyMongoResult};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use rat_logger::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// MongoDB连接
///
/// 客户端内部自带连接池，本类型可以廉价克隆后在多个仓储间共享
#[derive(Clone)]
pub struct MongoConnection {
    client: Client,
    database: Database,
    settings: MongoDbSettings,
}

impl MongoConnection {
    /// 根据连接配置建立连接
    ///
    /// 客户端创建是惰性的，实际的网络握手发生在第一次操作时。
    /// 需要立即确认连通性时调用 [`ping`](Self::ping)
    pub async fn connect(settings: MongoDbSettings) -> EasyMongoResult<Self> {
        settings.validate()?;

        let client_options = ClientOptions::parse(&settings.connection_string)
            .await
            .map_err(|e| EasyMongoError::ConfigError {
                message: format!("连接字符串解析失败: {}", e),
            })?;

        let client =
            Client::with_options(client_options).map_err(|e| EasyMongoError::ConnectionError {
                message: format!("MongoDB客户端创建失败: {}", e),
            })?;

        let database = client.database(&settings.database_name);

        info!(
            "MongoDB连接已创建: {} 数据库: {}",
            settings.redacted_connection_string(),
            settings.database_name
        );

        Ok(Self {
            client,
            database,
            settings,
        })
    }

    /// 获取数据库句柄
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// 获取底层客户端
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 获取连接配置
    pub fn settings(&self) -> &MongoDbSettings {
        &self.settings
    }

    /// 获取类型化集合句柄
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Unpin,
    {
        self.database.collection::<T>(name)
    }

    /// 向服务器发送ping命令确认连通性
    pub async fn ping(&self) -> EasyMongoResult<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        debug!("MongoDB ping成功: {}", self.settings.database_name);
        Ok(())
    }
}
