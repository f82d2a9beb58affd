//! 本地 query 引擎
//!
//! 每个 turn 调用一次 Messages API。模型请求的工具中，只有挂载的进程内
//! MCP server 提供的工具会在本地执行；其余内置工具回填错误结果。
//! 消息通过有界 mpsc 通道推给调用方，调用方丢弃 [`QueryStream`] 后，
//! 后台任务在下一次发送时退出。

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, ModelAliases};
use crate::mcp::SdkMcpServer;
use crate::providers::{
    ContentBlock, Message, MessageRequest, Provider, Role, ToolSpec, ToolUse, Usage,
};
use crate::security::{PermissionMode, ToolDecision, ToolPolicy};
use crate::tools::BUILTIN_TOOLS;

use super::definitions::NamedAgent;
use super::AgentError;

pub const CLAUDE_CODE_PRESET: &str = "claude_code";
pub const DEFAULT_MAX_TURNS: usize = 10;

const CHANNEL_CAPACITY: usize = 32;

const CLAUDE_CODE_BASE: &str = "You are an expert software engineering agent working inside a project repository.

Work in small, verifiable steps. Prefer existing patterns in the codebase over new abstractions. \
Use the tools that are available to you; when a tool reports that it is unavailable, continue \
with the information you have and explain what remains to be done. Keep answers concise and \
finish with a short summary of what changed.";

/// 工具执行确认回调
/// 参数: (tool_name, tool_input) → 返回 true 表示允许执行
pub type ConfirmFn = Box<dyn Fn(&str, &serde_json::Value) -> bool + Send + Sync>;

/// system prompt 来源
#[derive(Debug, Clone, PartialEq)]
pub enum SystemPrompt {
    Preset {
        preset: String,
        append: Option<String>,
    },
    Custom(String),
}

impl SystemPrompt {
    pub fn claude_code(append: Option<&str>) -> Self {
        SystemPrompt::Preset {
            preset: CLAUDE_CODE_PRESET.to_string(),
            append: append.map(String::from),
        }
    }

    fn base(&self) -> Result<&str, AgentError> {
        match self {
            SystemPrompt::Preset { preset, .. } if preset == CLAUDE_CODE_PRESET => {
                Ok(CLAUDE_CODE_BASE)
            }
            SystemPrompt::Preset { preset, .. } => Err(AgentError::UnknownPreset(preset.clone())),
            SystemPrompt::Custom(text) => Ok(text.as_str()),
        }
    }

    fn append(&self) -> Option<&str> {
        match self {
            SystemPrompt::Preset { append, .. } => append.as_deref(),
            SystemPrompt::Custom(_) => None,
        }
    }
}

/// 额外指令文件的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    /// ~/.claude/CLAUDE.md
    User,
    /// <working_dir>/CLAUDE.md
    Project,
    /// <working_dir>/CLAUDE.local.md
    Local,
}

impl SettingSource {
    fn path(&self, working_dir: &std::path::Path) -> Option<PathBuf> {
        match self {
            SettingSource::User => directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".claude").join("CLAUDE.md")),
            SettingSource::Project => Some(working_dir.join("CLAUDE.md")),
            SettingSource::Local => Some(working_dir.join("CLAUDE.local.md")),
        }
    }
}

/// 工具调用观察钩子，默认空实现
#[async_trait]
pub trait QueryHooks: Send + Sync {
    async fn pre_tool_use(&self, _tool: &str) {}
    async fn post_tool_use(&self, _tool: &str) {}
}

/// query 参数
pub struct QueryOptions {
    pub agents: Vec<&'static NamedAgent>,
    pub mcp_servers: Vec<Arc<SdkMcpServer>>,
    pub max_turns: usize,
    pub system_prompt: Option<SystemPrompt>,
    pub permission_mode: PermissionMode,
    pub hooks: Option<Arc<dyn QueryHooks>>,
    pub model: String,
    /// Agent 声明的模型别名（sonnet/opus/haiku）对应的模型 ID
    pub model_aliases: ModelAliases,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub confirm_fn: Option<ConfirmFn>,
    pub setting_sources: Vec<SettingSource>,
    pub working_dir: PathBuf,
}

impl Default for QueryOptions {
    fn default() -> Self {
        let defaults = crate::config::DefaultConfig::default();
        Self {
            agents: Vec::new(),
            mcp_servers: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            system_prompt: None,
            permission_mode: PermissionMode::Default,
            hooks: None,
            model: defaults.model,
            model_aliases: ModelAliases::default(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            confirm_fn: None,
            setting_sources: Vec::new(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl QueryOptions {
    /// 以配置文件中的模型设置为基础
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default.model.clone(),
            model_aliases: config.agent.models.clone(),
            max_tokens: config.default.max_tokens,
            temperature: config.default.temperature,
            ..Self::default()
        }
    }

    /// 实际请求使用的模型
    ///
    /// 所选 Agent 全部声明了同一个非 inherit 模型时使用其别名对应的 ID，
    /// 否则使用 `model`。
    pub fn resolved_model(&self) -> &str {
        let mut resolved: Option<&str> = None;
        for agent in &self.agents {
            let Some(id) = agent
                .definition
                .model
                .and_then(|m| m.resolve(&self.model_aliases))
            else {
                return &self.model;
            };
            match resolved {
                Some(prev) if prev != id => return &self.model,
                _ => resolved = Some(id),
            }
        }
        resolved.unwrap_or(&self.model)
    }

    pub fn agents(mut self, agents: Vec<&'static NamedAgent>) -> Self {
        self.agents = agents;
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    pub fn mcp_server(mut self, server: Arc<SdkMcpServer>) -> Self {
        self.mcp_servers.push(server);
        self
    }

    pub fn system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn QueryHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn confirm_fn(mut self, f: ConfirmFn) -> Self {
        self.confirm_fn = Some(f);
        self
    }
}

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 模型不再请求工具
    EndTurn,
    MaxTurns,
}

/// query 输出的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SdkMessage {
    System {
        subtype: String,
        session_id: String,
        model: String,
        agents: Vec<String>,
        tools: Vec<String>,
        permission_mode: PermissionMode,
    },
    Assistant {
        session_id: String,
        turn: usize,
        content: Vec<ContentBlock>,
    },
    User {
        session_id: String,
        content: Vec<ContentBlock>,
    },
    Result {
        session_id: String,
        num_turns: usize,
        stop_reason: StopReason,
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        duration_ms: u64,
    },
}

impl SdkMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SdkMessage::System { .. } => "system",
            SdkMessage::Assistant { .. } => "assistant",
            SdkMessage::User { .. } => "user",
            SdkMessage::Result { .. } => "result",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            SdkMessage::System { session_id, .. }
            | SdkMessage::Assistant { session_id, .. }
            | SdkMessage::User { session_id, .. }
            | SdkMessage::Result { session_id, .. } => session_id,
        }
    }

    /// 是否携带 content（assistant / user）
    pub fn has_content(&self) -> bool {
        matches!(self, SdkMessage::Assistant { .. } | SdkMessage::User { .. })
    }

    pub fn content(&self) -> &[ContentBlock] {
        match self {
            SdkMessage::Assistant { content, .. } | SdkMessage::User { content, .. } => content,
            _ => &[],
        }
    }

    /// assistant 消息中的工具调用
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        let SdkMessage::Assistant { content, .. } = self else {
            return Vec::new();
        };
        content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// assistant 消息的文本，或 result 消息的最终文本
    pub fn text(&self) -> Option<String> {
        match self {
            SdkMessage::Assistant { content, .. } => {
                let text: String = content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                (!text.is_empty()).then_some(text)
            }
            SdkMessage::Result { result, .. } => result.clone(),
            _ => None,
        }
    }
}

type Item = Result<SdkMessage, AgentError>;

/// query 的消息流
pub struct QueryStream {
    session_id: String,
    rx: mpsc::Receiver<Item>,
}

impl QueryStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn next(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// 读完整个流，遇到第一个错误即返回
    pub async fn collect(mut self) -> Result<Vec<SdkMessage>, AgentError> {
        let mut messages = Vec::new();
        while let Some(item) = self.rx.recv().await {
            messages.push(item?);
        }
        Ok(messages)
    }
}

impl Stream for QueryStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        self.rx.poll_recv(cx)
    }
}

/// 启动一次 query，返回消息流。需在 tokio runtime 中调用。
pub fn query(
    provider: Arc<dyn Provider>,
    prompt: impl Into<String>,
    options: QueryOptions,
) -> QueryStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Session {
        provider,
        policy: ToolPolicy::new(options.permission_mode, &options.agents),
        options,
        session_id: session_id.clone(),
        tx: tx.clone(),
    };
    let prompt = prompt.into();

    tokio::spawn(async move {
        if let Err(e) = session.run(prompt).await {
            warn!("query 失败: {}", e);
            let _ = tx.send(Err(e)).await;
        }
    });

    QueryStream { session_id, rx }
}

struct Session {
    provider: Arc<dyn Provider>,
    options: QueryOptions,
    policy: ToolPolicy,
    session_id: String,
    tx: mpsc::Sender<Item>,
}

impl Session {
    /// 发送失败说明调用方已丢弃流
    async fn emit(&self, msg: SdkMessage) -> bool {
        self.tx.send(Ok(msg)).await.is_ok()
    }

    async fn run(&self, prompt: String) -> Result<(), AgentError> {
        let started = Instant::now();
        let system = build_system_prompt(&self.options)?;
        let tools = self.tool_specs();
        let model = self.options.resolved_model();

        info!(
            session = %self.session_id,
            model = %model,
            agents = self.options.agents.len(),
            tools = tools.len(),
            max_turns = self.options.max_turns,
            "query 开始"
        );

        let init = SdkMessage::System {
            subtype: "init".to_string(),
            session_id: self.session_id.clone(),
            model: model.to_string(),
            agents: self.options.agents.iter().map(|a| a.name.to_string()).collect(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            permission_mode: self.options.permission_mode,
        };
        if !self.emit(init).await {
            return Ok(());
        }

        let mut history = vec![Message::user(prompt)];
        let mut usage = Usage::default();
        let mut final_text = None;
        let mut turns = 0;
        let stop_reason = loop {
            if turns >= self.options.max_turns {
                break StopReason::MaxTurns;
            }
            turns += 1;

            let mut request =
                MessageRequest::new(model, self.options.max_tokens, history.clone());
            request.system = system.clone();
            request.tools = tools.clone();
            request.temperature = self.options.temperature;

            let response = self.provider.create_message(&request).await?;
            usage.add(response.usage);
            debug!(turn = turns, stop_reason = ?response.stop_reason, "assistant 回合");

            if let Some(text) = response.text() {
                final_text = Some(text);
            }
            let tool_uses = response.tool_uses();
            let content: Vec<ContentBlock> = response
                .content
                .into_iter()
                .filter(|b| *b != ContentBlock::Other)
                .collect();

            let assistant = SdkMessage::Assistant {
                session_id: self.session_id.clone(),
                turn: turns,
                content: content.clone(),
            };
            if !self.emit(assistant).await {
                return Ok(());
            }

            if tool_uses.is_empty() {
                break StopReason::EndTurn;
            }
            history.push(Message::blocks(Role::Assistant, content));

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in &tool_uses {
                results.push(self.run_tool(tool_use).await);
            }
            let user = SdkMessage::User {
                session_id: self.session_id.clone(),
                content: results.clone(),
            };
            if !self.emit(user).await {
                return Ok(());
            }
            history.push(Message::blocks(Role::User, results));
        };

        info!(
            session = %self.session_id,
            turns,
            ?stop_reason,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "query 结束"
        );

        let result = SdkMessage::Result {
            session_id: self.session_id.clone(),
            num_turns: turns,
            stop_reason,
            usage,
            result: final_text,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.emit(result).await;
        Ok(())
    }

    /// MCP 工具 + 所选 Agent 允许的内置工具
    fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .options
            .mcp_servers
            .iter()
            .flat_map(|s| s.tool_specs())
            .collect();
        specs.extend(
            BUILTIN_TOOLS
                .iter()
                .filter(|t| self.policy.is_tool_allowed(t.name))
                .map(|t| t.spec()),
        );
        specs
    }

    async fn run_tool(&self, tool_use: &ToolUse) -> ContentBlock {
        let name = tool_use.name.as_str();
        let decision = self.policy.check(name);
        if let ToolDecision::Deny(reason) = decision {
            info!("工具被拒绝: {} - {}", name, reason);
            return tool_error(tool_use, reason);
        }

        let Some(server) = self
            .options
            .mcp_servers
            .iter()
            .find(|s| s.find(name).is_some())
        else {
            debug!("工具不在本地提供: {}", name);
            return tool_error(
                tool_use,
                format!("Tool '{}' is not available in this runtime", name),
            );
        };

        if decision == ToolDecision::Confirm {
            match &self.options.confirm_fn {
                Some(confirm) if confirm(name, &tool_use.input) => {}
                Some(_) => {
                    info!("用户拒绝执行工具: {}", name);
                    return tool_error(
                        tool_use,
                        format!("User denied execution of tool '{}'", name),
                    );
                }
                None => {
                    return tool_error(
                        tool_use,
                        format!(
                            "Tool '{}' requires confirmation in review-each-step mode but no confirmation handler is set",
                            name
                        ),
                    );
                }
            }
        }

        if let Some(hooks) = &self.options.hooks {
            hooks.pre_tool_use(name).await;
        }
        info!("执行工具: {} args={}", name, tool_use.input);
        let outcome = server.call(name, tool_use.input.clone()).await;
        if let Some(hooks) = &self.options.hooks {
            hooks.post_tool_use(name).await;
        }

        match outcome {
            Some(Ok(result)) => ContentBlock::ToolResult {
                tool_use_id: tool_use.id.clone(),
                content: result.to_content(),
                is_error: !result.success,
            },
            Some(Err(e)) => tool_error(tool_use, format!("{:#}", e)),
            None => tool_error(
                tool_use,
                format!("Tool '{}' is not available in this runtime", name),
            ),
        }
    }
}

fn tool_error(tool_use: &ToolUse, message: impl Into<String>) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: tool_use.id.clone(),
        content: message.into(),
        is_error: true,
    }
}

/// 拼装 system prompt：base → agents → 指令文件 → append
fn build_system_prompt(options: &QueryOptions) -> Result<Option<String>, AgentError> {
    let mut sections: Vec<String> = Vec::new();

    if let Some(prompt) = &options.system_prompt {
        sections.push(prompt.base()?.to_string());
    }

    if !options.agents.is_empty() {
        let mut text = String::from(
            "# Agents\n\nThe following specialized agents are configured for this session. \
             Adopt the matching agent's role for each part of the task and respect its tool list.",
        );
        for agent in &options.agents {
            let tools = agent
                .definition
                .tools
                .map(|t| t.join(", "))
                .unwrap_or_else(|| "all".to_string());
            text.push_str(&format!(
                "\n\n## {}\n{}\nTools: {}\n\n{}",
                agent.name, agent.definition.description, tools, agent.definition.prompt
            ));
        }
        sections.push(text);
    }

    for source in &options.setting_sources {
        let Some(path) = source.path(&options.working_dir) else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                debug!("已加载指令文件: {}", path.display());
                sections.push(format!(
                    "# Instructions from {}\n\n{}",
                    path.display(),
                    content.trim()
                ));
            }
            Ok(_) => {}
            Err(e) => debug!("跳过指令文件 {}: {}", path.display(), e),
        }
    }

    if let Some(append) = options.system_prompt.as_ref().and_then(|p| p.append()) {
        sections.push(append.to_string());
    }

    Ok((!sections.is_empty()).then(|| sections.join("\n\n")))
}
