//! 更新集类型定义
//!
//! 显式构造的稀疏字段级更新集，替代运行时反射：
//! 调用方声明要更新的字段与取值，未提及的字段在存储中保持不变

use crate::error::{EasyMongoError, EasyMongoResult};
use chrono::Utc;
use mongodb::bson::{Bson, Document, doc};

/// 稀疏更新集
///
/// 最终翻译为 `$set` 更新文档，从不产生 `$unset` 或显式null指令。
/// 标识字段（`id`/`_id`）不可变，禁止加入更新集
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    fields: Document,
}

impl Changeset {
    /// 创建空更新集
    pub fn new() -> Self {
        Self {
            fields: Document::new(),
        }
    }

    /// 设置字段的新值
    ///
    /// 拒绝null值：缺席字段应当直接不出现在更新集中，
    /// 而不是以null形式写入后抹掉存储中的旧值
    pub fn set<S: Into<String>, V: Into<Bson>>(mut self, field: S, value: V) -> EasyMongoResult<Self> {
        let field = field.into();
        let value = value.into();

        if field.is_empty() {
            return Err(EasyMongoError::ValidationError {
                field,
                message: "字段名不能为空".to_string(),
            });
        }
        if field == "id" || field == "_id" {
            return Err(EasyMongoError::ValidationError {
                field,
                message: "标识字段不可变，禁止加入更新集".to_string(),
            });
        }
        if matches!(value, Bson::Null) {
            return Err(EasyMongoError::ValidationError {
                field,
                message: "更新集不接受null值，未设置的字段应直接省略".to_string(),
            });
        }

        self.fields.insert(field, value);
        Ok(self)
    }

    /// 将修改时间字段设置为当前时间
    ///
    /// 时间戳以RFC3339字符串写入，与模型上chrono时间字段的serde表示一致
    pub fn touch_modified(self) -> EasyMongoResult<Self> {
        self.set("modified_at", Utc::now().to_rfc3339())
    }

    /// 从已有的稀疏更新文档创建更新集（内部使用，跳过逐字段校验）
    pub(crate) fn from_document(fields: Document) -> Self {
        Self { fields }
    }

    /// 判断更新集是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 更新集中的字段数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 更新集中的字段名列表
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// 校验更新集只引用了模型声明过的字段
    pub fn validate_against(&self, allowed_fields: &[&str]) -> EasyMongoResult<()> {
        for field in self.fields.keys() {
            if !allowed_fields.contains(&field.as_str()) {
                return Err(EasyMongoError::ValidationError {
                    field: field.clone(),
                    message: "更新集引用了模型未声明的字段".to_string(),
                });
            }
        }
        Ok(())
    }

    /// 翻译为MongoDB更新文档（`{"$set": {...}}`）
    pub fn into_update_document(self) -> Document {
        doc! { "$set": self.fields }
    }

    /// 以只读方式访问字段映射
    pub fn fields(&self) -> &Document {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_builds_sparse_document() {
        let changeset = Changeset::new()
            .set("name", "新名字")
            .unwrap()
            .set("age", 30i32)
            .unwrap();

        assert_eq!(changeset.len(), 2);
        let update = changeset.into_update_document();
        let set_doc = update.get_document("$set").unwrap();
        assert_eq!(set_doc.get_str("name").unwrap(), "新名字");
        assert_eq!(set_doc.get_i32("age").unwrap(), 30);
    }

    #[test]
    fn test_null_value_rejected() {
        let result = Changeset::new().set("name", Bson::Null);
        assert!(matches!(
            result,
            Err(EasyMongoError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_id_field_rejected() {
        assert!(Changeset::new().set("id", "x").is_err());
        assert!(Changeset::new().set("_id", "x").is_err());
    }

    #[test]
    fn test_zero_value_is_kept() {
        // 显式设置为零值与"未设置"不同，零值必须保留在更新集中
        let changeset = Changeset::new().set("count", 0i64).unwrap();
        let update = changeset.into_update_document();
        let set_doc = update.get_document("$set").unwrap();
        assert_eq!(set_doc.get_i64("count").unwrap(), 0);
    }

    #[test]
    fn test_validate_against_unknown_field() {
        let changeset = Changeset::new().set("nickname", "abc").unwrap();
        let result = changeset.validate_against(&["id", "name", "age"]);
        assert!(matches!(
            result,
            Err(EasyMongoError::ValidationError { .. })
        ));
    }
}
