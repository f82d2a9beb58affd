pub mod agent_info;
pub mod builtin;
pub mod echo;
pub mod traits;

pub use agent_info::AgentInfoTool;
pub use builtin::{find_builtin, BuiltinTool, BUILTIN_TOOLS};
pub use echo::EchoTool;
pub use traits::{Tool, ToolResult};

/// 编排器 MCP server 挂载的工具
pub fn orchestrator_tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(EchoTool), Box::new(AgentInfoTool)]
}
