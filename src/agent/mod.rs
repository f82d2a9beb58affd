pub mod definitions;
pub mod query;
pub mod runner;

pub use definitions::{AgentDefinition, AgentModel, NamedAgent, AGENTS};
pub use query::{
    query, ConfirmFn, QueryHooks, QueryOptions, QueryStream, SdkMessage, SettingSource,
    StopReason, SystemPrompt, CLAUDE_CODE_PRESET,
};
pub use runner::{dev_options, drain, plan_options, run_dev, run_plan, RunOverrides};

use crate::providers::ProviderError;

/// Agent 层错误
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent '{name}' not found. Available agents: {available}")]
    UnknownAgent { name: String, available: String },
    #[error("unknown system prompt preset '{0}'")]
    UnknownPreset(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
