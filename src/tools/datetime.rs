//! 当前日期时间工具

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::TurnContext;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolError};

#[derive(Deserialize, JsonSchema)]
struct DateTimeArgs {
    /// Date format string (e.g. '%Y-%m-%d %H:%M:%S'). Defaults to ISO format.
    #[serde(default)]
    format: Option<String>,
}

pub struct DateTimeTool;

/// 按 strftime 格式输出；格式为空或非法时输出 ISO-8601
fn render<Tz: TimeZone>(now: &DateTime<Tz>, format: Option<&str>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match format {
        Some(fmt) if !fmt.is_empty() && !StrftimeItems::new(fmt).any(|i| matches!(i, Item::Error)) => {
            now.format(fmt).to_string()
        }
        _ => now.to_rfc3339(),
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "get_current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current date and time. Use this when the user asks about today's date, current time, or needs timestamp information."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<DateTimeArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &TurnContext) -> Result<String, ToolError> {
        let args: DateTimeArgs = parse_args(args)?;
        Ok(render(&Local::now(), args.format.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_custom_format() {
        assert_eq!(render(&fixed(), Some("%Y-%m-%d %H:%M")), "2024-03-09 14:05");
    }

    #[test]
    fn test_invalid_or_missing_format_falls_back_to_iso() {
        assert_eq!(render(&fixed(), None), "2024-03-09T14:05:00+00:00");
        assert_eq!(render(&fixed(), Some("%Y-%")), "2024-03-09T14:05:00+00:00");
    }

    #[tokio::test]
    async fn test_execute_without_args() {
        let ctx = TurnContext::new("c", crate::core::Principal::new("u"), "q");
        let out = DateTimeTool.execute(Value::Null, &ctx).await.unwrap();
        assert!(DateTime::parse_from_rfc3339(&out).is_ok());
    }
}
