//! 工具参数 JSON Schema 生成（schemars）与参数解析

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::ToolError;

/// 由参数结构体生成下发给模型的 JSON Schema（去掉 `$schema` 元信息）
pub fn args_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
    }
    value
}

/// 把模型给出的参数解析为结构体；参数为 null 时按空对象处理
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct QueryArgs {
        /// 查询文本
        query: String,
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = args_schema::<QueryArgs>();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "query");
    }

    #[test]
    fn test_parse_args_reports_missing_field() {
        let err = parse_args::<QueryArgs>(Value::Null).err().unwrap();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
