//! 编排器的 Agent 定义表
//!
//! 每条记录是一段 prompt 加可用工具名列表，原样交给 query 引擎。
//! 表在编译期固定，运行期不会修改。

use serde::{Deserialize, Serialize};

use crate::config::ModelAliases;

use super::AgentError;

/// Agent 使用的模型别名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentModel {
    Sonnet,
    Opus,
    Haiku,
    /// 沿用 query 的默认模型
    Inherit,
}

impl AgentModel {
    /// 解析为具体模型 ID，Inherit 返回 None
    pub fn resolve<'a>(&self, aliases: &'a ModelAliases) -> Option<&'a str> {
        match self {
            AgentModel::Sonnet => Some(&aliases.sonnet),
            AgentModel::Opus => Some(&aliases.opus),
            AgentModel::Haiku => Some(&aliases.haiku),
            AgentModel::Inherit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDefinition {
    pub description: &'static str,
    pub prompt: &'static str,
    /// None 表示不限制工具
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<AgentModel>,
}

impl AgentDefinition {
    pub fn allows_tool(&self, name: &str) -> bool {
        self.tools.is_none_or(|tools| tools.contains(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedAgent {
    pub name: &'static str,
    #[serde(flatten)]
    pub definition: AgentDefinition,
}

pub static AGENTS: &[NamedAgent] = &[
    NamedAgent {
        name: "master-fullstack",
        definition: AgentDefinition {
            description: "Plans & coordinates coder/tester/research agents",
            prompt: "You are a master coordinator for fullstack development.

Your responsibilities:
- Orchestrate tasks across specialized agents (coder, tester, research, integrator)
- Enforce guardrails and write scopes
- Ensure complete deliverables with \"no piece missing\" verification
- Hand off clean JSON contracts between agents

Follow the orchestrator's safety rules and always verify completeness before delivery.",
            tools: None,
            model: Some(AgentModel::Sonnet),
        },
    },
    NamedAgent {
        name: "coder",
        definition: AgentDefinition {
            description: "Implements code changes for frontend, backend, and APIs",
            prompt: "You write minimal, tested, production-grade code.

Your responsibilities:
- Implement features following existing patterns
- Respect write scopes and protected files
- Write clean, maintainable code with proper types
- Add inline documentation where needed

Never modify protected files without approval. Always follow the project's conventions.",
            tools: Some(&["Read", "Edit", "Write", "Grep", "Glob", "Bash"]),
            model: None,
        },
    },
    NamedAgent {
        name: "tester",
        definition: AgentDefinition {
            description: "Writes and runs comprehensive tests",
            prompt: "You create failing tests first, then make them pass.

Your responsibilities:
- Write Playwright E2E tests for user flows
- Write Vitest unit tests for business logic
- Ensure tests are fast and deterministic
- Achieve high test coverage (80%+ target)

Prefer integration tests over unit tests for better confidence. Always verify tests pass before handoff.",
            tools: Some(&["Read", "Write", "Edit", "Bash", "Grep", "Glob"]),
            model: None,
        },
    },
    NamedAgent {
        name: "research",
        definition: AgentDefinition {
            description: "Researches APIs, best practices, and technical documentation",
            prompt: "You research technical documentation, APIs, and best practices.

Your responsibilities:
- Find official documentation and reliable sources
- Summarize tradeoffs between different approaches
- Cite all sources with URLs
- Output concise technical briefs

Always verify information is current and accurate. Prefer official docs over blog posts.",
            tools: Some(&["Read", "WebSearch", "WebFetch", "Grep", "Glob"]),
            model: None,
        },
    },
    NamedAgent {
        name: "integrator",
        definition: AgentDefinition {
            description: "Merges outputs and resolves conflicts between agents",
            prompt: "You integrate work from multiple agents and resolve conflicts.

Your responsibilities:
- Merge code from different agents
- Resolve merge conflicts intelligently
- Ensure consistency across the codebase
- Verify all pieces fit together correctly

Test the integrated solution before declaring success. Ensure no regressions.",
            tools: Some(&["Read", "Edit", "Grep", "Glob", "Bash"]),
            model: None,
        },
    },
    NamedAgent {
        name: "stuck",
        definition: AgentDefinition {
            description: "Detects dead-ends and provides escalation paths",
            prompt: "You detect when agents are stuck and provide escalation.

Your responsibilities:
- Recognize patterns of being stuck (retries, errors, dead-ends)
- Provide 3 escalation options (A/B/C choices)
- Suggest alternative approaches
- Know when to ask for human help

Be proactive in detecting blockers. Always provide actionable alternatives.",
            tools: Some(&["Read", "Grep", "Glob"]),
            model: None,
        },
    },
    NamedAgent {
        name: "master-devops",
        definition: AgentDefinition {
            description: "Handles CI/CD and deployment with safety guardrails",
            prompt: "You manage CI/CD pipelines and safe deployments.

Your responsibilities:
- Deploy to staging first, verify, then production
- Enforce test gates (all tests must pass)
- Handle rollbacks if issues detected
- Update deployment documentation

Never skip safety checks. Always verify staging before production deploy.",
            tools: Some(&["Read", "Bash", "Grep", "Glob"]),
            model: None,
        },
    },
    NamedAgent {
        name: "master-docs",
        definition: AgentDefinition {
            description: "Generates README, ADR, and CHANGELOG documentation",
            prompt: "You maintain comprehensive project documentation.

Your responsibilities:
- Keep README.md up to date
- Write Architecture Decision Records (ADRs)
- Maintain CHANGELOG.md
- Document APIs and public interfaces

Write clear, concise documentation. Use examples and diagrams where helpful.",
            tools: Some(&["Read", "Write", "Edit", "Grep", "Glob"]),
            model: None,
        },
    },
    NamedAgent {
        name: "master-data",
        definition: AgentDefinition {
            description: "Manages seeds, fixtures, and data integrity",
            prompt: "You handle database seeds, test fixtures, and data integrity.

Your responsibilities:
- Create realistic seed data
- Maintain test fixtures
- Ensure data integrity constraints
- Handle migrations safely

Test migrations both up and down. Ensure seeds work on fresh databases.",
            tools: Some(&["Read", "Write", "Edit", "Bash", "Grep", "Glob"]),
            model: None,
        },
    },
];

pub fn all() -> &'static [NamedAgent] {
    AGENTS
}

pub fn find(name: &str) -> Option<&'static NamedAgent> {
    AGENTS.iter().find(|a| a.name == name)
}

pub fn get(name: &str) -> Option<&'static AgentDefinition> {
    find(name).map(|a| &a.definition)
}

pub fn names() -> Vec<&'static str> {
    AGENTS.iter().map(|a| a.name).collect()
}

/// 按名称挑选 Agent 子集，保持调用方给出的顺序
pub fn select<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static NamedAgent>, AgentError> {
    names
        .iter()
        .map(|n| {
            find(n.as_ref()).ok_or_else(|| AgentError::UnknownAgent {
                name: n.as_ref().to_string(),
                available: self::names().join(", "),
            })
        })
        .collect()
}

#[derive(Serialize)]
struct AgentSummary {
    name: &'static str,
    description: &'static str,
}

/// getAgentInfo 工具的输出：指定名称时返回完整定义，否则返回名称+描述列表
pub fn agent_info_json(name: Option<&str>) -> String {
    match name {
        Some(name) => match find(name) {
            Some(agent) => serde_json::to_string_pretty(agent).unwrap_or_default(),
            None => format!(
                "Agent '{}' not found. Available agents: {}",
                name,
                names().join(", ")
            ),
        },
        None => {
            let summaries: Vec<AgentSummary> = AGENTS
                .iter()
                .map(|a| AgentSummary {
                    name: a.name,
                    description: a.definition.description,
                })
                .collect();
            serde_json::to_string_pretty(&summaries).unwrap_or_default()
        }
    }
}
