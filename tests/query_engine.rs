//! query 引擎集成测试
//!
//! MockProvider 按顺序返回预设响应，验证 turn 循环、工具执行、
//! 权限模式与 hooks 的组合行为。

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::MockProvider;
use dropin_orchestrator::agent::definitions::select;
use dropin_orchestrator::agent::{
    query, run_plan, AgentError, QueryOptions, RunOverrides, SdkMessage, StopReason,
};
use dropin_orchestrator::demos::ToolUsageHooks;
use dropin_orchestrator::mcp::orchestrator_server;
use dropin_orchestrator::providers::ContentBlock;
use dropin_orchestrator::security::PermissionMode;

const ECHO: &str = "mcp__orchestrator-sdk__echo";

fn options() -> QueryOptions {
    QueryOptions::from_config(&common::test_config()).mcp_server(Arc::new(orchestrator_server()))
}

/// 第一条 user 消息里的 tool_result
fn first_tool_result(messages: &[SdkMessage]) -> (String, bool) {
    messages
        .iter()
        .find_map(|m| match m {
            SdkMessage::User { content, .. } => content.iter().find_map(|b| match b {
                ContentBlock::ToolResult {
                    content, is_error, ..
                } => Some((content.clone(), *is_error)),
                _ => None,
            }),
            _ => None,
        })
        .expect("应有 tool_result")
}

#[tokio::test]
async fn text_reply_ends_turn() {
    let mock = MockProvider::new(vec![MockProvider::text("done")]);
    let messages = query(Arc::new(mock.clone()), "hi", options())
        .collect()
        .await
        .unwrap();

    let kinds: Vec<&str> = messages.iter().map(|m| m.kind()).collect();
    assert_eq!(kinds, vec!["system", "assistant", "result"]);
    match messages.last().unwrap() {
        SdkMessage::Result {
            num_turns,
            stop_reason,
            result,
            usage,
            ..
        } => {
            assert_eq!(*num_turns, 1);
            assert_eq!(*stop_reason, StopReason::EndTurn);
            assert_eq!(result.as_deref(), Some("done"));
            assert_eq!(usage.output_tokens, 5);
        }
        other => panic!("unexpected {:?}", other),
    }

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "mock-model");
    assert!(requests[0].tools.iter().any(|t| t.name == ECHO));
}

#[tokio::test]
async fn session_id_is_shared() {
    let mock = MockProvider::new(vec![MockProvider::text("ok")]);
    let stream = query(Arc::new(mock), "hi", QueryOptions::default());
    let id = stream.session_id().to_string();
    let messages = stream.collect().await.unwrap();
    assert!(messages.iter().all(|m| m.session_id() == id));
}

#[tokio::test]
async fn mcp_echo_executes_locally() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "hi"})),
        MockProvider::text("Echoed."),
    ]);
    let messages = query(Arc::new(mock.clone()), "echo hi", options())
        .collect()
        .await
        .unwrap();

    let (content, is_error) = first_tool_result(&messages);
    assert_eq!(content, "Echo: hi");
    assert!(!is_error);

    // 第二次请求带上 assistant tool_use + user tool_result
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn builtin_tools_are_not_available() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", "Read", json!({"file_path": "src/main.rs"})),
        MockProvider::text("ok"),
    ]);
    let messages = query(Arc::new(mock), "read", options())
        .collect()
        .await
        .unwrap();

    let (content, is_error) = first_tool_result(&messages);
    assert_eq!(content, "Tool 'Read' is not available in this runtime");
    assert!(is_error);
}

#[tokio::test]
async fn max_turns_stops_loop() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "1"})),
        MockProvider::tool_call("tu_2", ECHO, json!({"text": "2"})),
        MockProvider::text("never reached"),
    ]);
    let messages = query(Arc::new(mock.clone()), "loop", options().max_turns(2))
        .collect()
        .await
        .unwrap();

    match messages.last().unwrap() {
        SdkMessage::Result {
            num_turns,
            stop_reason,
            ..
        } => {
            assert_eq!(*num_turns, 2);
            assert_eq!(*stop_reason, StopReason::MaxTurns);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(mock.remaining(), 1);
}

#[tokio::test]
async fn review_each_step_without_handler_denies() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "hi"})),
        MockProvider::text("ok"),
    ]);
    let opts = options().permission_mode(PermissionMode::ReviewEachStep);
    let messages = query(Arc::new(mock), "echo", opts).collect().await.unwrap();

    let (content, is_error) = first_tool_result(&messages);
    assert!(is_error);
    assert!(content.contains("requires confirmation"));
}

#[tokio::test]
async fn review_each_step_uses_confirm_fn() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "yes"})),
        MockProvider::text("ok"),
    ]);
    let opts = options()
        .permission_mode(PermissionMode::ReviewEachStep)
        .confirm_fn(Box::new(|name: &str, input: &Value| {
            name == ECHO && input["text"] == "yes"
        }));
    let messages = query(Arc::new(mock), "echo", opts).collect().await.unwrap();
    assert_eq!(first_tool_result(&messages), ("Echo: yes".to_string(), false));

    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "no"})),
        MockProvider::text("ok"),
    ]);
    let opts = options()
        .permission_mode(PermissionMode::ReviewEachStep)
        .confirm_fn(Box::new(|_: &str, _: &Value| false));
    let messages = query(Arc::new(mock), "echo", opts).collect().await.unwrap();
    let (content, is_error) = first_tool_result(&messages);
    assert!(is_error);
    assert_eq!(
        content,
        format!("User denied execution of tool '{}'", ECHO)
    );
}

#[tokio::test]
async fn hooks_wrap_executed_tools() {
    let hooks = Arc::new(ToolUsageHooks::default());
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "a"})),
        MockProvider::tool_call("tu_2", "Glob", json!({"pattern": "**/*.ts"})),
        MockProvider::text("ok"),
    ]);
    query(Arc::new(mock), "go", options().hooks(hooks.clone()))
        .collect()
        .await
        .unwrap();

    // Glob 未在本地执行，不触发 hooks
    assert_eq!(hooks.usage().get(ECHO), Some(&1));
    assert_eq!(hooks.usage().len(), 1);
    assert_eq!(
        hooks.events(),
        vec![
            format!("[Hook] About to use tool: {}", ECHO),
            format!("[Hook] Completed tool: {}", ECHO),
        ]
    );
}

#[tokio::test]
async fn agent_allow_list_denies_other_tools() {
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", "Bash", json!({"command": "ls"})),
        MockProvider::text("ok"),
    ]);
    let opts = options().agents(select(&["research"]).unwrap());
    let messages = query(Arc::new(mock.clone()), "ls", opts)
        .collect()
        .await
        .unwrap();

    let (content, is_error) = first_tool_result(&messages);
    assert!(is_error);
    assert_eq!(
        content,
        "Tool 'Bash' is not permitted for the selected agents"
    );

    // research 只拿到自己的内置工具 + MCP 工具
    let names: Vec<String> = mock.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert!(names.contains(&"WebSearch".to_string()));
    assert!(!names.contains(&"Bash".to_string()));
    assert!(names.contains(&ECHO.to_string()));

    match &messages[0] {
        SdkMessage::System { agents, .. } => assert_eq!(agents, &vec!["research".to_string()]),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn agents_appear_in_system_prompt() {
    let mock = MockProvider::new(vec![MockProvider::text("ok")]);
    let opts = options().agents(select(&["coder", "tester"]).unwrap());
    query(Arc::new(mock.clone()), "hi", opts)
        .collect()
        .await
        .unwrap();

    let system = mock.requests()[0].system.clone().unwrap();
    assert!(system.contains("## coder"));
    assert!(system.contains("## tester"));
}

#[tokio::test]
async fn provider_error_ends_stream() {
    let mock = MockProvider::new(vec![MockProvider::api_error(
        500,
        json!({"type": "error", "error": {"type": "api_error", "message": "boom"}}),
    )]);
    let err = query(Arc::new(mock), "hi", options())
        .collect()
        .await
        .unwrap_err();
    match err {
        AgentError::Provider(e) => assert_eq!(e.status(), Some(500)),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn agent_model_alias_selects_request_model() {
    let mut config = common::test_config();
    config.agent.models.sonnet = "claude-sonnet-alias".to_string();
    let mock = MockProvider::new(vec![MockProvider::text("ok")]);
    let opts = QueryOptions::from_config(&config).agents(select(&["master-fullstack"]).unwrap());
    let messages = query(Arc::new(mock.clone()), "hi", opts)
        .collect()
        .await
        .unwrap();

    assert_eq!(mock.requests()[0].model, "claude-sonnet-alias");
    match &messages[0] {
        SdkMessage::System { model, .. } => assert_eq!(model, "claude-sonnet-alias"),
        other => panic!("unexpected {:?}", other),
    }

    // coder 未声明模型，沿用默认
    let mock = MockProvider::new(vec![MockProvider::text("ok")]);
    let opts = QueryOptions::from_config(&config).agents(select(&["coder"]).unwrap());
    query(Arc::new(mock.clone()), "hi", opts)
        .collect()
        .await
        .unwrap();
    assert_eq!(mock.requests()[0].model, "mock-model");
}

#[tokio::test]
async fn dropped_stream_stops_session() {
    let mock = MockProvider::new(vec![MockProvider::text("never read")]);
    let stream = query(Arc::new(mock.clone()), "hi", options());
    drop(stream);

    // 给后台任务时间跑完
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(mock.requests().len(), 0);
    assert_eq!(mock.remaining(), 1);
}

#[tokio::test]
async fn run_plan_writes_only_content_messages() {
    let config = common::test_config();
    let mock = MockProvider::new(vec![
        MockProvider::tool_call("tu_1", ECHO, json!({"text": "plan"})),
        MockProvider::text("1. do it"),
    ]);
    let mut out = Vec::new();
    let messages = run_plan(
        Arc::new(mock),
        &config,
        "plan it",
        RunOverrides::default(),
        &mut out,
    )
    .await
    .unwrap();

    // system + assistant + user + assistant + result
    assert_eq!(messages.len(), 5);
    let text = String::from_utf8(out).unwrap();
    let kinds: Vec<String> = text
        .lines()
        .map(|line| {
            let v: Value = serde_json::from_str(line).unwrap();
            v["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["assistant", "user", "assistant"]);
}
