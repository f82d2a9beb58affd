use tracing::{debug, info};

use crate::config::{AnthropicConfig, Config, SkillsConfig, API_KEY_ENV};
use crate::providers::{
    AnthropicProvider, Container, Message, MessageRequest, Provider, ProviderError,
};

use super::{custom_skill, AnthropicSkill, Skill};

/// Skills runner 构造参数，未设置的字段取默认值
#[derive(Debug, Clone, Default)]
pub struct SkillsRunnerConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
}

/// Skills 调用错误
#[derive(Debug, thiserror::Error)]
pub enum SkillsError {
    #[error("ANTHROPIC_API_KEY environment variable is required")]
    MissingApiKey,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl SkillsError {
    /// "暂不可用" 类错误：skill 未上传、版本不存在等，调用方应跳过而非中止
    pub fn is_unavailable(&self) -> bool {
        let SkillsError::Provider(e) = self else {
            return false;
        };
        if e.status() == Some(404) || e.error_type().as_deref() == Some("not_found_error") {
            return true;
        }
        match e {
            ProviderError::Api { body, .. } => {
                let body = body.to_lowercase();
                body.contains("skill")
                    && (body.contains("not found") || body.contains("does not exist"))
            }
            _ => false,
        }
    }
}

/// 通过 Messages API 执行带 Agent Skills 的查询
pub struct SkillsRunner {
    provider: Box<dyn Provider>,
    model: String,
    max_tokens: u32,
}

impl SkillsRunner {
    /// 按参数创建，api_key 缺省时读取 ANTHROPIC_API_KEY
    pub fn new(config: SkillsRunnerConfig) -> Result<Self, SkillsError> {
        let api_key = resolve_api_key(config.api_key, std::env::var(API_KEY_ENV).ok())?;
        let defaults = SkillsConfig::default();
        let mut anthropic = AnthropicConfig::default();
        if let Some(base_url) = config.base_url {
            anthropic.base_url = base_url;
        }

        let provider = AnthropicProvider::new(&anthropic, api_key).with_betas(defaults.betas);
        Ok(Self::with_provider(
            Box::new(provider),
            config.model.unwrap_or(defaults.model),
            config.max_tokens.unwrap_or(defaults.max_tokens),
        ))
    }

    /// 从全局配置创建（CLI 使用）
    pub fn from_config(config: &Config) -> Result<Self, SkillsError> {
        let api_key = config.api_key().ok_or(SkillsError::MissingApiKey)?;
        let provider = AnthropicProvider::new(&config.anthropic, api_key)
            .with_betas(config.skills.betas.clone());
        Ok(Self::with_provider(
            Box::new(provider),
            config.skills.model.clone(),
            config.skills.max_tokens,
        ))
    }

    /// 注入任意 Provider（测试用 MockProvider）
    pub fn with_provider(provider: Box<dyn Provider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// 构造 skills 请求体
    pub fn build_request(&self, user_message: &str, skills: Vec<Skill>) -> MessageRequest {
        let mut request = MessageRequest::new(
            self.model.clone(),
            self.max_tokens,
            vec![Message::user(user_message)],
        );
        request.container = Some(Container { skills });
        request
    }

    /// 执行查询，原样返回服务端响应 JSON
    pub async fn run(
        &self,
        user_message: &str,
        skills: Vec<Skill>,
    ) -> Result<serde_json::Value, SkillsError> {
        let ids: Vec<&str> = skills.iter().map(|s| s.skill_id.as_str()).collect();
        info!(skills = ?ids, "running skills query");
        let request = self.build_request(user_message, skills);
        let response = self.provider.create_message(&request).await?;
        debug!(id = %response.id, stop_reason = ?response.stop_reason, "skills query finished");
        Ok(response.raw)
    }

    pub async fn run_with_pdf_skill(
        &self,
        user_message: &str,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, vec![AnthropicSkill::Pdf.skill()]).await
    }

    pub async fn run_with_excel_skill(
        &self,
        user_message: &str,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, vec![AnthropicSkill::Xlsx.skill()]).await
    }

    pub async fn run_with_power_point_skill(
        &self,
        user_message: &str,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, vec![AnthropicSkill::Pptx.skill()]).await
    }

    pub async fn run_with_word_skill(
        &self,
        user_message: &str,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, vec![AnthropicSkill::Docx.skill()]).await
    }

    pub async fn run_with_custom_skill(
        &self,
        user_message: &str,
        skill_id: &str,
        version: Option<&str>,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, vec![custom_skill(skill_id, version)])
            .await
    }

    pub async fn run_with_multiple_skills(
        &self,
        user_message: &str,
        skills: Vec<Skill>,
    ) -> Result<serde_json::Value, SkillsError> {
        self.run(user_message, skills).await
    }
}

/// 便捷构造函数
pub fn create_skills_runner(config: SkillsRunnerConfig) -> Result<SkillsRunner, SkillsError> {
    SkillsRunner::new(config)
}

/// 显式参数优先（即使为空串），未传时读环境变量；最终为空视为缺失
fn resolve_api_key(
    explicit: Option<String>,
    from_env: Option<String>,
) -> Result<String, SkillsError> {
    explicit
        .or(from_env)
        .filter(|k| !k.trim().is_empty())
        .ok_or(SkillsError::MissingApiKey)
}
