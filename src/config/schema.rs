use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 读取凭证的环境变量名
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// 全局配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// query / workflow 默认模型设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub model: String,
    pub max_tokens: u32,
    /// None 表示使用服务端默认
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Anthropic API 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub base_url: String,
    /// 为空时回退到 ANTHROPIC_API_KEY 环境变量
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Skills runner 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    pub model: String,
    pub max_tokens: u32,
    /// container.skills 需要的 beta 特性
    #[serde(default = "default_skill_betas")]
    pub betas: Vec<String>,
}

fn default_skill_betas() -> Vec<String> {
    vec![
        "code-execution-2025-08-25".to_string(),
        "skills-2025-10-02".to_string(),
    ]
}

/// Agent 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_plan_max_turns")]
    pub plan_max_turns: usize,
    #[serde(default = "default_dev_max_turns")]
    pub dev_max_turns: usize,
    /// 追加在 preset system prompt 之后的护栏说明
    #[serde(default = "default_guardrail_append")]
    pub guardrail_append: String,
    /// 模型别名（sonnet/opus/haiku）到具体模型 ID 的映射
    #[serde(default)]
    pub models: ModelAliases,
}

fn default_plan_max_turns() -> usize {
    3
}

fn default_dev_max_turns() -> usize {
    50
}

fn default_guardrail_append() -> String {
    "Follow the orchestrator's guardrails and safety rules strictly.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAliases {
    pub sonnet: String,
    pub opus: String,
    pub haiku: String,
}

impl Default for ModelAliases {
    fn default() -> Self {
        Self {
            sonnet: "claude-sonnet-4-5".to_string(),
            opus: "claude-opus-4-1".to_string(),
            haiku: "claude-haiku-4-5".to_string(),
        }
    }
}

/// 可靠性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// 最大重试次数，默认 0（失败即报错）
    #[serde(default)]
    pub max_retries: usize,
    /// 初始退避毫秒，默认 500
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 500,
        }
    }
}

/// 工作流校验步骤使用的写入范围
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub write_scope: Vec<String>,
    pub protected_files: Vec<String>,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 8192,
            temperature: None,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            api_version: default_api_version(),
        }
    }
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-7-sonnet-2025-09-29".to_string(),
            max_tokens: 4096,
            betas: default_skill_betas(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plan_max_turns: default_plan_max_turns(),
            dev_max_turns: default_dev_max_turns(),
            guardrail_append: default_guardrail_append(),
            models: ModelAliases::default(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            write_scope: vec!["src/**".to_string(), "app/**".to_string()],
            protected_files: vec![".env*".to_string(), "infra/**".to_string()],
        }
    }
}

/// 默认配置 TOML 模板
pub(crate) const DEFAULT_CONFIG_TOML: &str = r#"[default]
model = "claude-sonnet-4-5"
max_tokens = 8192

[anthropic]
base_url = "https://api.anthropic.com"
# 留空则读取 ANTHROPIC_API_KEY 环境变量
api_key = ""

[skills]
model = "claude-3-7-sonnet-2025-09-29"
max_tokens = 4096

[agent]
plan_max_turns = 3
dev_max_turns = 50

# [agent.models]
# sonnet = "claude-sonnet-4-5"
# opus = "claude-opus-4-1"
# haiku = "claude-haiku-4-5"

[workflow]
write_scope = ["src/**", "app/**"]
protected_files = [".env*", "infra/**"]

# 可靠性配置（可选）
# [reliability]
# max_retries = 2
# initial_backoff_ms = 500
"#;

impl Config {
    /// 返回 `~/.dropin/`
    pub fn home_dir() -> Result<PathBuf> {
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| color_eyre::eyre::eyre!("Cannot determine home directory"))?;
        Ok(base_dirs.home_dir().join(".dropin"))
    }

    /// 返回配置文件路径: `~/.dropin/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// 加载配置，如果配置文件不存在则创建默认配置
    pub fn load_or_init() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).wrap_err("Failed to create config directory")?;
            }
            std::fs::write(&config_path, DEFAULT_CONFIG_TOML)
                .wrap_err("Failed to write default config")?;
        }

        Self::load_from_path(&config_path)
    }

    /// 从指定路径加载配置（figment 多层合并）
    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DROPIN_").split("__"))
            .extract()
            .wrap_err("Failed to parse config file")?;

        if config.anthropic.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                config.anthropic.api_key = key;
            }
        }

        url::Url::parse(&config.anthropic.base_url).wrap_err_with(|| {
            format!("Invalid anthropic.base_url: {}", config.anthropic.base_url)
        })?;

        Ok(config)
    }

    /// 已解析的 API Key，空字符串视为缺失
    pub fn api_key(&self) -> Option<&str> {
        let key = self.anthropic.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = Config::default();
        assert_eq!(config.anthropic.base_url, "https://api.anthropic.com");
        assert_eq!(config.anthropic.api_version, "2023-06-01");
        assert_eq!(config.skills.model, "claude-3-7-sonnet-2025-09-29");
        assert_eq!(config.skills.max_tokens, 4096);
        assert_eq!(config.agent.plan_max_turns, 3);
        assert_eq!(config.agent.dev_max_turns, 50);
        assert_eq!(config.reliability.max_retries, 0);
        assert!(config
            .workflow
            .protected_files
            .contains(&".env*".to_string()));
        assert!(config.api_key().is_none());
    }

    #[test]
    fn load_from_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let toml_path = tmp.path().join("config.toml");
        std::fs::write(
            &toml_path,
            r#"
[default]
model = "claude-opus-4-1"
max_tokens = 2048
temperature = 0.2

[anthropic]
base_url = "https://proxy.example.com"
api_key = "sk-ant-test"

[agent]
plan_max_turns = 5

[reliability]
max_retries = 2
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&toml_path).unwrap();
        assert_eq!(config.default.model, "claude-opus-4-1");
        assert_eq!(config.default.max_tokens, 2048);
        assert_eq!(config.default.temperature, Some(0.2));
        assert_eq!(config.anthropic.base_url, "https://proxy.example.com");
        assert_eq!(config.api_key(), Some("sk-ant-test"));
        assert_eq!(config.agent.plan_max_turns, 5);
        // 未写的字段保持默认
        assert_eq!(config.agent.dev_max_turns, 50);
        assert_eq!(config.reliability.max_retries, 2);
        assert_eq!(config.reliability.initial_backoff_ms, 500);
    }

    #[test]
    fn default_template_parses() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, DEFAULT_CONFIG_TOML).unwrap();
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.default.model, "claude-sonnet-4-5");
        assert_eq!(config.workflow.write_scope, vec!["src/**", "app/**"]);
        assert_eq!(config.skills.betas.len(), 2);
    }

    #[test]
    fn invalid_base_url_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[anthropic]
base_url = "not a url"
"#,
        )
        .unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn whitespace_api_key_is_missing() {
        let mut config = Config::default();
        config.anthropic.api_key = "   ".to_string();
        assert!(config.api_key().is_none());
    }

    #[test]
    fn config_path_ends_with_dropin() {
        let path = Config::config_path().unwrap();
        assert!(path.ends_with(".dropin/config.toml"));
    }
}
