//! `dropin demo` 的示例流程

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::definitions::select;
use crate::agent::{query, run_dev, run_plan, AgentError, QueryHooks, QueryOptions, RunOverrides};
use crate::config::Config;
use crate::providers::Provider;
use crate::security::PermissionMode;
use crate::skills::AnthropicSkill;

pub fn write_missing_key_notice<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "⚠️  ANTHROPIC_API_KEY not set. Examples will be skipped.\n")
}

/// 统计工具调用次数，并记录 pre/post 事件
#[derive(Default)]
pub struct ToolUsageHooks {
    usage: Mutex<BTreeMap<String, usize>>,
    events: Mutex<Vec<String>>,
}

impl ToolUsageHooks {
    pub fn usage(&self) -> BTreeMap<String, usize> {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl QueryHooks for ToolUsageHooks {
    async fn pre_tool_use(&self, tool: &str) {
        self.record(format!("[Hook] About to use tool: {}", tool));
    }

    async fn post_tool_use(&self, tool: &str) {
        if let Ok(mut usage) = self.usage.lock() {
            *usage.entry(tool.to_string()).or_insert(0) += 1;
        }
        self.record(format!("[Hook] Completed tool: {}", tool));
    }
}

/// SDK 示例：plan、dev、自定义 research 查询、hooks 统计
pub async fn sdk_demo<W: Write>(
    provider: Arc<dyn Provider>,
    config: &Config,
    out: &mut W,
) -> Result<(), AgentError> {
    writeln!(out, "🚀 Agent SDK Examples\n")?;

    writeln!(out, "=== Example 1: Run a Plan ===\n")?;
    let messages = run_plan(
        provider.clone(),
        config,
        "Create a step-by-step plan to add input validation to the user signup form",
        RunOverrides {
            max_turns: Some(3),
            ..Default::default()
        },
        out,
    )
    .await?;
    writeln!(out, "\n✅ Generated {} messages\n", messages.len())?;

    writeln!(out, "=== Example 2: Run Development Task ===\n")?;
    let messages = run_dev(
        provider.clone(),
        config,
        "Add a simple utility function to format dates as ISO strings",
        RunOverrides::default(),
        out,
    )
    .await?;
    writeln!(out, "\n✅ Completed with {} messages\n", messages.len())?;

    writeln!(out, "=== Example 3: Custom Query with Specific Agents ===\n")?;
    let options = QueryOptions::from_config(config)
        .agents(select(&["research"])?)
        .max_turns(5)
        .permission_mode(PermissionMode::ReviewEachStep);
    let mut stream = query(
        provider.clone(),
        "Research best practices for React Server Components",
        options,
    );
    let mut count = 0;
    while let Some(item) = stream.next().await {
        let msg = item?;
        if msg.has_content() {
            count += 1;
            writeln!(out, "Message {}: {}", count, msg.kind())?;
        }
    }
    writeln!(out, "\n✅ Research completed with {} messages\n", count)?;

    writeln!(out, "=== Example 4: Query with Observability Hooks ===\n")?;
    let hooks = Arc::new(ToolUsageHooks::default());
    let options = QueryOptions::from_config(config)
        .agents(select(&["coder"])?)
        .max_turns(5)
        .hooks(hooks.clone());
    query(
        provider,
        "List all TypeScript files in the packages directory",
        options,
    )
    .collect()
    .await?;
    for event in hooks.events() {
        writeln!(out, "{}", event)?;
    }
    writeln!(out, "\n📊 Tool Usage Statistics:")?;
    for (tool, count) in hooks.usage() {
        writeln!(out, "  {}: {} times", tool, count)?;
    }
    writeln!(out, "\n✅ Query with hooks complete\n")?;

    writeln!(out, "✅ All SDK examples completed successfully!")?;
    Ok(())
}

/// Skills 示例：预置 skill 概览与用法
pub fn skills_demo<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "🎯 Agent Skills Examples\n")?;
    writeln!(out, "=== Available Anthropic Skills ===\n")?;
    writeln!(out, "Pre-built Anthropic Skills:")?;
    for skill in AnthropicSkill::ALL {
        writeln!(
            out,
            "  • {} ({}) - {}",
            skill.label(),
            skill.id(),
            skill.description()
        )?;
    }

    writeln!(out, "\nUsage:")?;
    writeln!(out, "  dropin skills run pdf \"Extract tables\"")?;
    writeln!(out, "  # or combine several skills")?;
    writeln!(
        out,
        "  dropin skills run pdf --custom skill_orchestrator_schema_validator \"Query\""
    )?;
    writeln!(out, "\n✅ Skills overview complete\n")?;

    writeln!(out, "To run with actual files:")?;
    writeln!(out, "  1. Provide PDF/Excel/Word documents in your prompts")?;
    writeln!(out, "  2. Upload custom skills using scripts/skills/upload.sh")?;
    writeln!(out, "  3. Reference uploaded skills by their skill_id")?;
    writeln!(out, "\n✅ Skills examples overview complete!")
}
