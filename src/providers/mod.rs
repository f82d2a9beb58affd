pub mod claude;
pub mod reliable;
pub mod traits;

pub use claude::AnthropicProvider;
pub use reliable::{ReliableProvider, RetryConfig};
pub use traits::{
    Container, ContentBlock, Message, MessageContent, MessageRequest, MessageResponse, Provider,
    ProviderError, Role, ToolSpec, ToolUse, Usage,
};

use crate::config::Config;

/// 根据配置创建带重试的 Anthropic Provider
pub fn create_provider(config: &Config, api_key: &str) -> Box<dyn Provider> {
    let inner = AnthropicProvider::new(&config.anthropic, api_key);
    Box::new(ReliableProvider::new(
        Box::new(inner),
        RetryConfig {
            max_retries: config.reliability.max_retries,
            initial_backoff_ms: config.reliability.initial_backoff_ms,
            ..Default::default()
        },
    ))
}
