use async_trait::async_trait;
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};

use crate::providers::ToolSpec;

/// 工具执行结果
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// 回填给模型的文本，失败时带上错误信息
    pub fn to_content(&self) -> String {
        match &self.error {
            Some(e) if self.output.is_empty() => format!("Error: {}", e),
            Some(e) => format!("{}\nError: {}", self.output, e),
            None => self.output.clone(),
        }
    }
}

/// 进程内工具抽象
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;

    /// 生成 ToolSpec 供 Provider 使用
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}
