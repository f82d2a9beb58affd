use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::definitions::NamedAgent;
use crate::mcp::is_mcp_tool;

/// 工具执行的权限模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    /// 直接执行本地可用工具
    #[default]
    Default,
    /// 每次工具调用前询问确认
    ReviewEachStep,
    /// 完全信任，不询问
    Trusted,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::ReviewEachStep => "review-each-step",
            PermissionMode::Trusted => "trusted",
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        *self == PermissionMode::ReviewEachStep
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "review-each-step" => Ok(PermissionMode::ReviewEachStep),
            "trusted" => Ok(PermissionMode::Trusted),
            other => Err(format!(
                "unknown permission mode '{}' (expected default, review-each-step or trusted)",
                other
            )),
        }
    }
}

/// 单次工具调用的判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    Allow,
    /// 需要 confirm_fn 确认
    Confirm,
    Deny(String),
}

/// 由所选 Agent 的工具白名单 + 权限模式组合出的策略
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    mode: PermissionMode,
    /// None 表示不限制（无 Agent，或某个 Agent 未声明工具列表）
    allowed: Option<BTreeSet<&'static str>>,
}

impl ToolPolicy {
    pub fn new(mode: PermissionMode, agents: &[&'static NamedAgent]) -> Self {
        let mut allowed = BTreeSet::new();
        let mut unrestricted = agents.is_empty();
        for agent in agents {
            match agent.definition.tools {
                Some(tools) => allowed.extend(tools.iter().copied()),
                None => unrestricted = true,
            }
        }
        Self {
            mode,
            allowed: if unrestricted { None } else { Some(allowed) },
        }
    }

    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// MCP 工具不受 Agent 白名单限制
    pub fn is_tool_allowed(&self, name: &str) -> bool {
        is_mcp_tool(name)
            || self
                .allowed
                .as_ref()
                .is_none_or(|allowed| allowed.contains(name))
    }

    pub fn check(&self, name: &str) -> ToolDecision {
        if !self.is_tool_allowed(name) {
            return ToolDecision::Deny(format!(
                "Tool '{}' is not permitted for the selected agents",
                name
            ));
        }
        if self.mode.requires_confirmation() {
            ToolDecision::Confirm
        } else {
            ToolDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::definitions::find;

    fn agents(names: &[&str]) -> Vec<&'static NamedAgent> {
        names.iter().map(|n| find(n).unwrap()).collect()
    }

    #[test]
    fn permission_mode_parsing() {
        assert_eq!(
            "review-each-step".parse::<PermissionMode>().unwrap(),
            PermissionMode::ReviewEachStep
        );
        assert_eq!("trusted".parse::<PermissionMode>().unwrap(), PermissionMode::Trusted);
        assert!("yolo".parse::<PermissionMode>().is_err());
        assert_eq!(
            serde_json::to_value(PermissionMode::ReviewEachStep).unwrap(),
            "review-each-step"
        );
    }

    #[test]
    fn union_of_agent_tool_lists() {
        let policy = ToolPolicy::new(PermissionMode::Default, &agents(&["stuck", "research"]));
        assert!(policy.is_tool_allowed("Grep"));
        assert!(policy.is_tool_allowed("WebFetch"));
        assert!(!policy.is_tool_allowed("Bash"));
        assert!(matches!(policy.check("Bash"), ToolDecision::Deny(_)));
        assert_eq!(policy.check("Read"), ToolDecision::Allow);
    }

    #[test]
    fn agent_without_list_lifts_restriction() {
        let policy = ToolPolicy::new(
            PermissionMode::Trusted,
            &agents(&["stuck", "master-fullstack"]),
        );
        assert!(policy.is_tool_allowed("Bash"));
        assert!(ToolPolicy::new(PermissionMode::Default, &[]).is_tool_allowed("Anything"));
    }

    #[test]
    fn mcp_tools_bypass_allow_list() {
        let policy = ToolPolicy::new(PermissionMode::Default, &agents(&["stuck"]));
        assert!(policy.is_tool_allowed("mcp__orchestrator-sdk__echo"));
    }

    #[test]
    fn review_mode_requires_confirmation() {
        let policy = ToolPolicy::new(PermissionMode::ReviewEachStep, &agents(&["coder"]));
        assert_eq!(policy.check("Read"), ToolDecision::Confirm);
        assert!(matches!(policy.check("WebSearch"), ToolDecision::Deny(_)));
    }
}
