use std::io::Write;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::mcp::orchestrator_server;
use crate::providers::Provider;
use crate::security::PermissionMode;

use super::definitions::{all, NamedAgent};
use super::query::{query, QueryOptions, SdkMessage, SettingSource, SystemPrompt};
use super::AgentError;

/// 调用方对 run_plan / run_dev 默认参数的覆盖
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub max_turns: Option<usize>,
    pub permission_mode: Option<PermissionMode>,
    pub agents: Option<Vec<&'static NamedAgent>>,
}

/// 编排器运行参数：全部 Agent + orchestrator-sdk + 护栏
fn orchestrator_options(
    config: &Config,
    default_max_turns: usize,
    default_mode: PermissionMode,
    overrides: RunOverrides,
) -> QueryOptions {
    let mut options = QueryOptions::from_config(config)
        .agents(overrides.agents.unwrap_or_else(|| all().iter().collect()))
        .mcp_server(Arc::new(orchestrator_server()))
        .max_turns(overrides.max_turns.unwrap_or(default_max_turns))
        .permission_mode(overrides.permission_mode.unwrap_or(default_mode))
        .system_prompt(SystemPrompt::claude_code(Some(&config.agent.guardrail_append)));
    options.setting_sources = vec![SettingSource::Project];
    options
}

pub fn plan_options(config: &Config, overrides: RunOverrides) -> QueryOptions {
    orchestrator_options(
        config,
        config.agent.plan_max_turns,
        PermissionMode::Default,
        overrides,
    )
}

pub fn dev_options(config: &Config, overrides: RunOverrides) -> QueryOptions {
    orchestrator_options(
        config,
        config.agent.dev_max_turns,
        PermissionMode::Trusted,
        overrides,
    )
}

/// 规划：默认 3 轮
pub async fn run_plan<W: Write>(
    provider: Arc<dyn Provider>,
    config: &Config,
    prompt: &str,
    overrides: RunOverrides,
    out: &mut W,
) -> Result<Vec<SdkMessage>, AgentError> {
    drain(provider, prompt, plan_options(config, overrides), out).await
}

/// 开发：默认 50 轮，trusted 权限
pub async fn run_dev<W: Write>(
    provider: Arc<dyn Provider>,
    config: &Config,
    prompt: &str,
    overrides: RunOverrides,
    out: &mut W,
) -> Result<Vec<SdkMessage>, AgentError> {
    drain(provider, prompt, dev_options(config, overrides), out).await
}

/// 收集全部消息，带 content 的消息逐行写出 JSON
pub async fn drain<W: Write>(
    provider: Arc<dyn Provider>,
    prompt: &str,
    options: QueryOptions,
    out: &mut W,
) -> Result<Vec<SdkMessage>, AgentError> {
    let mut stream = query(provider, prompt, options);
    let mut messages = Vec::new();
    while let Some(item) = stream.next().await {
        let msg = item?;
        if msg.has_content() {
            serde_json::to_writer(&mut *out, &msg)?;
            writeln!(out)?;
        }
        messages.push(msg);
    }
    out.flush()?;
    info!(session = %stream.session_id(), count = messages.len(), "run finished");
    Ok(messages)
}
