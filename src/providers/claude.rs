use async_trait::async_trait;
use tracing::debug;

use crate::config::AnthropicConfig;

use super::traits::{MessageRequest, MessageResponse, Provider, ProviderError};

/// Anthropic Messages API Provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_version: String,
    /// `anthropic-beta` 头，skills container 需要
    betas: Vec<String>,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: config.api_version.clone(),
            betas: Vec::new(),
        }
    }

    /// 附加 beta 特性头
    pub fn with_betas(mut self, betas: Vec<String>) -> Self {
        self.betas = betas;
        self
    }

    /// 构造请求 URL
    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn beta_header(&self) -> Option<String> {
        if self.betas.is_empty() {
            None
        } else {
            Some(self.betas.join(","))
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ProviderError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            skills = request.container.as_ref().map_or(0, |c| c.skills.len()),
            "POST {}",
            self.endpoint()
        );

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("Content-Type", "application/json");
        if let Some(beta) = self.beta_header() {
            builder = builder.header("anthropic-beta", beta);
        }

        let resp = builder.json(request).send().await?;

        let status = resp.status();
        let resp_text = resp.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: resp_text,
            });
        }

        let raw: serde_json::Value = serde_json::from_str(&resp_text)?;
        Ok(MessageResponse::from_value(raw)?)
    }
}
