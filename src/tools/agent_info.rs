use async_trait::async_trait;
use color_eyre::eyre::Result;
use serde_json::json;

use crate::agent::definitions::agent_info_json;

use super::traits::{Tool, ToolResult};

/// 查询编排器 Agent 定义（纯读取）
pub struct AgentInfoTool;

#[async_trait]
impl Tool for AgentInfoTool {
    fn name(&self) -> &str {
        "getAgentInfo"
    }

    fn description(&self) -> &str {
        "Get information about available orchestrator agents"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "agentName": {
                    "type": "string",
                    "description": "Specific agent name to query"
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        // 未找到的 Agent 也算成功调用，输出里列出可用名称
        let name = args.get("agentName").and_then(|v| v.as_str());
        Ok(ToolResult::ok(agent_info_json(name)))
    }
}
