use color_eyre::eyre::{Context, Result};
use dialoguer::{Input, Password, Select};
use toml_edit::{value, DocumentMut};

use super::schema::{Config, DEFAULT_CONFIG_TOML};

/// 可选的默认模型
pub const MODELS: &[(&str, &str)] = &[
    ("claude-sonnet-4-5", "balanced (default)"),
    ("claude-opus-4-1", "most capable"),
    ("claude-haiku-4-5", "fastest"),
];

/// 向导收集到的设置
#[derive(Debug, Clone, PartialEq)]
pub struct SetupAnswers {
    /// 空字符串表示继续使用 ANTHROPIC_API_KEY 环境变量
    pub api_key: String,
    pub model: String,
    pub plan_max_turns: usize,
    pub dev_max_turns: usize,
}

/// 运行交互式配置向导
pub fn run_setup() -> Result<()> {
    println!("🔧 dropin setup\n");

    let api_key: String = Password::new()
        .with_prompt("Anthropic API key (leave empty to use ANTHROPIC_API_KEY)")
        .allow_empty_password(true)
        .interact()
        .wrap_err("Failed to read API key")?;
    println!();

    let labels: Vec<String> = MODELS
        .iter()
        .map(|(id, note)| format!("{} - {}", id, note))
        .collect();
    let model_idx = Select::new()
        .with_prompt("Default model")
        .items(&labels)
        .default(0)
        .interact()
        .wrap_err("Failed to select model")?;
    println!();

    let plan_max_turns: usize = Input::new()
        .with_prompt("Max turns for plan runs")
        .default(3)
        .interact_text()
        .wrap_err("Failed to read plan max turns")?;

    let dev_max_turns: usize = Input::new()
        .with_prompt("Max turns for dev runs")
        .default(50)
        .interact_text()
        .wrap_err("Failed to read dev max turns")?;
    println!();

    let answers = SetupAnswers {
        api_key,
        model: MODELS[model_idx].0.to_string(),
        plan_max_turns,
        dev_max_turns,
    };

    let config_path = Config::config_path()?;
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).wrap_err("Failed to create config directory")?;
    }
    let existing = std::fs::read_to_string(&config_path)
        .unwrap_or_else(|_| DEFAULT_CONFIG_TOML.to_string());
    let updated = apply_answers(&existing, &answers)?;
    std::fs::write(&config_path, updated).wrap_err("Failed to write config file")?;

    println!("✅ Config saved to: {}", config_path.display());
    Ok(())
}

/// 把向导结果写入现有 TOML，保留注释和其他字段
pub fn apply_answers(existing: &str, answers: &SetupAnswers) -> Result<String> {
    let mut doc = existing
        .parse::<DocumentMut>()
        .wrap_err("Existing config is not valid TOML")?;

    doc["default"]["model"] = value(answers.model.as_str());
    if !answers.api_key.is_empty() {
        doc["anthropic"]["api_key"] = value(answers.api_key.as_str());
    }
    doc["agent"]["plan_max_turns"] = value(answers.plan_max_turns as i64);
    doc["agent"]["dev_max_turns"] = value(answers.dev_max_turns as i64);

    Ok(doc.to_string())
}
