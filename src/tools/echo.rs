use async_trait::async_trait;
use color_eyre::eyre::Result;
use serde_json::json;

use super::traits::{Tool, ToolResult};

/// 回显工具，用于验证 MCP 链路
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo a string back"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to echo"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let Some(text) = args.get("text").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Missing 'text' parameter"));
        };
        Ok(ToolResult::ok(format!("Echo: {}", text)))
    }
}
