// 每个集成测试文件只使用 MockProvider 的部分方法，dead_code 为预期行为
#![allow(dead_code)]

//! 测试专用 MockProvider
//!
//! 实现 Provider trait，预置响应队列（VecDeque），
//! 每次 create_message 调用从队列头部弹出一个响应，并记录请求。
//!
//! - 队列空时返回 Err，便于检测意外的额外 LLM 调用
//! - Clone 共享同一队列，测试保留一份用于读取已发送的请求

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use dropin_orchestrator::providers::{MessageRequest, MessageResponse, Provider, ProviderError};

type Reply = Result<MessageResponse, ProviderError>;

#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<MessageRequest>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Reply>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    /// 原样返回一段响应 JSON
    pub fn raw(value: Value) -> Reply {
        Ok(MessageResponse::from_value(value).expect("mock response 必须可解析"))
    }

    /// 纯文本回复（end_turn）
    pub fn text(content: &str) -> Reply {
        Self::raw(json!({
            "id": "msg_text",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": content}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
    }

    /// 单个 tool_use 回复
    pub fn tool_call(id: &str, name: &str, input: Value) -> Reply {
        Self::raw(json!({
            "id": format!("msg_{}", id),
            "type": "message",
            "role": "assistant",
            "content": [{"type": "tool_use", "id": id, "name": name, "input": input}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
    }

    pub fn api_error(status: u16, body: Value) -> Reply {
        Err(ProviderError::Api {
            status,
            body: body.to_string(),
        })
    }

    /// 已收到的请求
    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().expect("MockProvider mutex 中毒").clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("MockProvider mutex 中毒").len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn create_message(&self, request: &MessageRequest) -> Reply {
        self.requests
            .lock()
            .expect("MockProvider mutex 中毒")
            .push(request.clone());
        let mut queue = self.responses.lock().expect("MockProvider mutex 中毒");
        queue.pop_front().unwrap_or_else(|| {
            Err(ProviderError::Transport(
                "MockProvider 响应队列已空：意外的额外 LLM 调用".to_string(),
            ))
        })
    }
}
