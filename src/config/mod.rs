pub mod schema;
pub mod setup;

pub use schema::{
    AgentConfig, AnthropicConfig, Config, DefaultConfig, ModelAliases, ReliabilityConfig,
    SkillsConfig, WorkflowConfig, API_KEY_ENV,
};
pub use setup::{apply_answers, run_setup, SetupAnswers, MODELS};
