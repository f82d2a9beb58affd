//! 进程内 MCP server
//!
//! 与外部 MCP 进程不同，这里的工具直接在当前进程执行。暴露给模型的
//! 工具名带 `mcp__{server}__{tool}` 前缀，避免与其他工具冲突。

use color_eyre::eyre::Result;
use tracing::debug;

use crate::providers::ToolSpec;
use crate::tools::{orchestrator_tools, Tool, ToolResult};

pub const ORCHESTRATOR_SERVER_NAME: &str = "orchestrator-sdk";
pub const ORCHESTRATOR_SERVER_VERSION: &str = "1.0.0";

const PREFIX: &str = "mcp__";

/// 一个进程内 MCP server：名称、版本和一组工具
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: Vec<Box<dyn Tool>>,
}

impl SdkMcpServer {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        tools: Vec<Box<dyn Tool>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// 工具对外名称：mcp__{server}__{tool}
    pub fn qualified_name(&self, tool: &str) -> String {
        format!("{}{}__{}", PREFIX, self.name, tool)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| self.qualified_name(t.name()))
            .collect()
    }

    /// 带前缀的 ToolSpec 列表
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| {
                let mut spec = t.spec();
                spec.name = self.qualified_name(t.name());
                spec
            })
            .collect()
    }

    /// 按对外名称查找工具
    pub fn find(&self, qualified: &str) -> Option<&dyn Tool> {
        let rest = qualified.strip_prefix(PREFIX)?;
        let tool_name = rest.strip_prefix(self.name.as_str())?.strip_prefix("__")?;
        self.tools
            .iter()
            .find(|t| t.name() == tool_name)
            .map(|t| t.as_ref())
    }

    /// 执行工具，None 表示此 server 不提供该工具
    pub async fn call(
        &self,
        qualified: &str,
        args: serde_json::Value,
    ) -> Option<Result<ToolResult>> {
        let tool = self.find(qualified)?;
        debug!(server = %self.name, tool = tool.name(), "calling in-process MCP tool");
        Some(tool.execute(args).await)
    }
}

/// 是否为 MCP 工具名（任意 server）
pub fn is_mcp_tool(name: &str) -> bool {
    name.starts_with(PREFIX)
}

/// 编排器自带的 `orchestrator-sdk` server（echo + getAgentInfo）
pub fn orchestrator_server() -> SdkMcpServer {
    SdkMcpServer::new(
        ORCHESTRATOR_SERVER_NAME,
        ORCHESTRATOR_SERVER_VERSION,
        orchestrator_tools(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn orchestrator_server_identity() {
        let server = orchestrator_server();
        assert_eq!(server.name(), "orchestrator-sdk");
        assert_eq!(server.version(), "1.0.0");
        assert_eq!(
            server.tool_names(),
            vec![
                "mcp__orchestrator-sdk__echo",
                "mcp__orchestrator-sdk__getAgentInfo"
            ]
        );
    }

    #[test]
    fn specs_are_prefixed() {
        let specs = orchestrator_server().tool_specs();
        assert_eq!(specs[0].name, "mcp__orchestrator-sdk__echo");
        assert_eq!(specs[0].description, "Echo a string back");
    }

    #[test]
    fn find_rejects_other_servers() {
        let server = orchestrator_server();
        assert!(server.find("mcp__orchestrator-sdk__echo").is_some());
        assert!(server.find("mcp__other__echo").is_none());
        assert!(server.find("echo").is_none());
        assert!(server.find("mcp__orchestrator-sdk__missing").is_none());
        assert!(is_mcp_tool("mcp__x__y"));
        assert!(!is_mcp_tool("Bash"));
    }

    #[tokio::test]
    async fn call_routes_to_tool() {
        let server = orchestrator_server();
        let result = server
            .call("mcp__orchestrator-sdk__echo", json!({"text": "ping"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.output, "Echo: ping");
        assert!(server.call("Read", json!({})).await.is_none());
    }
}
