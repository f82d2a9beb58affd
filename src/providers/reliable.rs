use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use super::traits::{MessageRequest, MessageResponse, Provider, ProviderError};

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: usize,
    /// 初始退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避乘数（每次失败后乘以该值）
    pub backoff_multiplier: f64,
    /// 最大退避时间上限（毫秒）
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

/// 可靠 Provider 包装层：对可重试错误做指数退避
pub struct ReliableProvider {
    inner: Box<dyn Provider>,
    config: RetryConfig,
}

impl ReliableProvider {
    pub fn new(inner: Box<dyn Provider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Provider for ReliableProvider {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ProviderError> {
        let mut backoff_ms = self.config.initial_backoff_ms;
        let mut attempt = 0;

        loop {
            match self.inner.create_message(request).await {
                Ok(resp) => {
                    if attempt > 0 {
                        debug!("重试成功（第 {} 次尝试）", attempt + 1);
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    if !e.is_retryable() {
                        warn!("不可重试的错误，停止: {}", truncate_error(&e.to_string()));
                        return Err(e);
                    }

                    warn!(
                        "第 {} 次尝试失败，{} ms 后重试: {}",
                        attempt + 1,
                        backoff_ms,
                        truncate_error(&e.to_string())
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;

                    // 指数退避，不超过上限
                    backoff_ms = ((backoff_ms as f64) * self.config.backoff_multiplier) as u64;
                    backoff_ms = backoff_ms.min(self.config.max_backoff_ms);
                    attempt += 1;
                }
            }
        }
    }
}

/// 截断错误信息用于日志（按 char 边界截断）
fn truncate_error(s: &str) -> String {
    s.char_indices()
        .nth(150)
        .map(|(i, _)| &s[..i])
        .unwrap_or(s)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Usage;
    use std::sync::{Arc, Mutex};

    fn ok_response() -> MessageResponse {
        MessageResponse::from_value(serde_json::json!({
            "id": "msg_ok",
            "content": [{"type": "text", "text": "ok"}]
        }))
        .unwrap()
    }

    struct FlakyProvider {
        /// 剩余失败次数，归零后返回成功
        remaining: Arc<Mutex<usize>>,
        calls: Arc<Mutex<usize>>,
        error_status: u16,
    }

    impl FlakyProvider {
        fn new(failures: usize, error_status: u16) -> Self {
            Self {
                remaining: Arc::new(Mutex::new(failures)),
                calls: Arc::new(Mutex::new(0)),
                error_status,
            }
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        async fn create_message(
            &self,
            _request: &MessageRequest,
        ) -> Result<MessageResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::Api {
                    status: self.error_status,
                    body: "simulated".to_string(),
                });
            }
            Ok(ok_response())
        }
    }

    fn fast_retry(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            backoff_multiplier: 1.0,
            max_backoff_ms: 5,
        }
    }

    fn request() -> MessageRequest {
        MessageRequest::new("m", 8, vec![])
    }

    #[tokio::test]
    async fn retries_and_succeeds() {
        let flaky = FlakyProvider::new(2, 503);
        let calls = flaky.calls.clone();
        let provider = ReliableProvider::new(Box::new(flaky), fast_retry(3));
        let resp = provider.create_message(&request()).await.unwrap();
        assert_eq!(resp.text().as_deref(), Some("ok"));
        assert_eq!(resp.usage, Usage::default());
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn fails_after_max_retries() {
        let provider = ReliableProvider::new(Box::new(FlakyProvider::new(5, 500)), fast_retry(2));
        let err = provider.create_message(&request()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn default_config_fails_fast() {
        let flaky = FlakyProvider::new(1, 503);
        let calls = flaky.calls.clone();
        let provider = ReliableProvider::new(Box::new(flaky), RetryConfig::default());
        assert!(provider.create_message(&request()).await.is_err());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn client_errors_not_retried() {
        let flaky = FlakyProvider::new(1, 404);
        let calls = flaky.calls.clone();
        let provider = ReliableProvider::new(Box::new(flaky), fast_retry(3));
        let err = provider.create_message(&request()).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let long = "错".repeat(200);
        assert_eq!(truncate_error(&long).chars().count(), 150);
    }
}
