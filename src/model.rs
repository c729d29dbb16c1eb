//! Model trait 定义模块
//!
//! 定义文档模型的最小形状契约和稀疏更新文档的构造逻辑

use crate::error::{EasyMongoError, EasyMongoResult};
use crate::types::Changeset;
use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 文档模型契约
///
/// 所有存储的文档类型都必须实现这个特征。契约要求：
///
/// - `id`：字符串类型的唯一标识，由调用方在创建时赋值，创建后不可变，
///   序列化时必须映射到 `_id`（`#[serde(rename = "_id")]`）
/// - `created_at`：创建时间，只在创建时设置一次
/// - `modified_at`：可选的修改时间，由更新操作设置；值为 `None` 表示从未修改，
///   必须配合 `#[serde(skip_serializing_if = "Option::is_none")]` 使其在
///   序列化结果中整体缺席，而不是写成null字段
///
/// 可缺席的字段一律使用 `Option<T>` 表达：`None` 表示未设置（更新时被省略），
/// `Some(零值)` 表示刻意设置为零值（更新时保留），两者在类型层面可区分
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// 获取集合名
    fn collection_name() -> String;

    /// 获取模型声明的字段名列表
    ///
    /// 用于在调用时校验投影和更新集，引用未声明字段会得到校验错误
    fn field_names() -> &'static [&'static str];

    /// 获取文档唯一标识
    fn id(&self) -> &str;

    /// 获取创建时间
    fn created_at(&self) -> DateTime<Utc>;

    /// 获取修改时间，`None` 表示从未修改
    fn modified_at(&self) -> Option<DateTime<Utc>>;

    /// 构造稀疏更新文档
    ///
    /// 序列化模型并遍历所有字段：携带取值的字段进入更新集，
    /// null（即 `Option` 为 `None`）的字段被整体省略，从不生成显式的
    /// null/unset指令；标识字段不可变，同样被剔除。
    /// 由此产生的是字段级补丁而不是整文档替换：
    /// 内存实例中缺席的字段在存储中保持原值
    fn to_update_document(&self) -> EasyMongoResult<Document> {
        let full = mongodb::bson::to_document(self).map_err(|e| {
            EasyMongoError::SerializationError {
                message: format!("模型序列化失败: {}", e),
            }
        })?;

        let mut sparse = Document::new();
        for (key, value) in full {
            if key == "_id" || key == "id" {
                continue;
            }
            if matches!(value, Bson::Null) {
                continue;
            }
            sparse.insert(key, value);
        }

        Ok(sparse)
    }

    /// 将模型转换为显式更新集
    fn to_changeset(&self) -> EasyMongoResult<Changeset> {
        Ok(Changeset::from_document(self.to_update_document()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Account {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        balance: i64,
        created_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    }

    impl Model for Account {
        fn collection_name() -> String {
            "accounts".to_string()
        }

        fn field_names() -> &'static [&'static str] {
            &["id", "name", "balance", "created_at", "modified_at", "nickname"]
        }

        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn modified_at(&self) -> Option<DateTime<Utc>> {
            self.modified_at
        }
    }

    fn sample() -> Account {
        Account {
            id: "acc-1".to_string(),
            name: "测试账户".to_string(),
            balance: 0,
            created_at: Utc::now(),
            modified_at: None,
            nickname: None,
        }
    }

    #[test]
    fn test_update_document_excludes_id() {
        let doc = sample().to_update_document().unwrap();
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("id"));
    }

    #[test]
    fn test_update_document_omits_absent_fields() {
        let doc = sample().to_update_document().unwrap();
        // None字段整体缺席，而不是以null出现
        assert!(!doc.contains_key("modified_at"));
        assert!(!doc.contains_key("nickname"));
    }

    #[test]
    fn test_update_document_keeps_zero_values() {
        let doc = sample().to_update_document().unwrap();
        // 刻意设置的零值与"未设置"不同，必须保留
        assert_eq!(doc.get_i64("balance").unwrap(), 0);
    }

    #[test]
    fn test_update_document_keeps_present_option() {
        let mut account = sample();
        account.nickname = Some("小账户".to_string());
        let doc = account.to_update_document().unwrap();
        assert_eq!(doc.get_str("nickname").unwrap(), "小账户");
    }

    #[test]
    fn test_to_changeset_roundtrip() {
        let changeset = sample().to_changeset().unwrap();
        assert!(changeset.field_names().contains(&"name"));
        assert!(!changeset.field_names().contains(&"_id"));
    }
}
