//! 错误类型定义模块
//!
//! 提供统一的错误分类，并负责把 mongodb 驱动错误归类到领域错误

use thiserror::Error;

/// easy_mongo 统一错误类型
#[derive(Debug, Error)]
pub enum EasyMongoError {
    /// 连接错误 - 数据库不可达
    #[error("连接错误: {message}")]
    ConnectionError {
        /// 错误信息
        message: String,
    },

    /// 超时错误 - 操作在限定时间内未完成
    #[error("超时错误: {message}")]
    TimeoutError {
        /// 错误信息
        message: String,
    },

    /// 唯一键冲突 - 插入违反唯一性约束
    #[error("唯一键冲突: {message}")]
    DuplicateKeyError {
        /// 错误信息
        message: String,
    },

    /// 校验错误 - 过滤/投影/更新集引用了不存在的字段或非法值
    #[error("校验错误: 字段 '{field}': {message}")]
    ValidationError {
        /// 出错的字段名
        field: String,
        /// 错误信息
        message: String,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    SerializationError {
        /// 错误信息
        message: String,
    },

    /// 查询执行错误
    #[error("查询错误: {message}")]
    QueryError {
        /// 错误信息
        message: String,
    },

    /// 配置错误 - 必填配置项缺失或非法
    #[error("配置错误: {message}")]
    ConfigError {
        /// 错误信息
        message: String,
    },
}

/// easy_mongo 统一结果类型
pub type EasyMongoResult<T> = Result<T, EasyMongoError>;

impl From<mongodb::error::Error> for EasyMongoError {
    fn from(err: mongodb::error::Error) -> Self {
        classify_driver_error(&err)
    }
}

/// 将 mongodb 驱动错误归类到领域错误分类
///
/// 分类规则：
/// - 写入/命令错误码 11000 -> 唯一键冲突
/// - IO 超时 -> 超时错误，其余 IO 错误 -> 连接错误
/// - 服务器选择失败（含连接池失效）-> 连接错误
/// - 其余 -> 查询错误
pub fn classify_driver_error(err: &mongodb::error::Error) -> EasyMongoError {
    use mongodb::error::{ErrorKind, WriteFailure};

    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000 => {
            EasyMongoError::DuplicateKeyError {
                message: we.message.clone(),
            }
        }
        ErrorKind::BulkWrite(failure) => {
            let duplicate = failure
                .write_errors
                .as_ref()
                .map(|errors| errors.iter().any(|e| e.code == 11000))
                .unwrap_or(false);
            if duplicate {
                EasyMongoError::DuplicateKeyError {
                    message: format!("批量写入存在唯一键冲突: {}", err),
                }
            } else {
                EasyMongoError::QueryError {
                    message: format!("批量写入失败: {}", err),
                }
            }
        }
        ErrorKind::Command(ce) if ce.code == 11000 => EasyMongoError::DuplicateKeyError {
            message: ce.message.clone(),
        },
        ErrorKind::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::TimedOut {
                EasyMongoError::TimeoutError {
                    message: format!("IO超时: {}", err),
                }
            } else {
                EasyMongoError::ConnectionError {
                    message: format!("IO错误: {}", err),
                }
            }
        }
        ErrorKind::ServerSelection { message, .. } => EasyMongoError::ConnectionError {
            message: message.clone(),
        },
        ErrorKind::ConnectionPoolCleared { message, .. } => EasyMongoError::ConnectionError {
            message: message.clone(),
        },
        ErrorKind::BsonSerialization(e) => EasyMongoError::SerializationError {
            message: e.to_string(),
        },
        ErrorKind::BsonDeserialization(e) => EasyMongoError::SerializationError {
            message: e.to_string(),
        },
        _ => EasyMongoError::QueryError {
            message: err.to_string(),
        },
    }
}

impl EasyMongoError {
    /// 判断错误是否为瞬时故障（可由重试策略处理）
    ///
    /// 健康监控只对这一类错误进行重试，其余错误直接上抛
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EasyMongoError::ConnectionError { .. } | EasyMongoError::TimeoutError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let conn = EasyMongoError::ConnectionError {
            message: "不可达".to_string(),
        };
        let timeout = EasyMongoError::TimeoutError {
            message: "超时".to_string(),
        };
        let dup = EasyMongoError::DuplicateKeyError {
            message: "E11000".to_string(),
        };

        assert!(conn.is_transient());
        assert!(timeout.is_transient());
        assert!(!dup.is_transient());
    }

    #[test]
    fn test_error_display_contains_message() {
        let err = EasyMongoError::ValidationError {
            field: "age".to_string(),
            message: "字段不存在".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("age"));
        assert!(text.contains("字段不存在"));
    }
}
