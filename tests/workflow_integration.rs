//! 完整流程集成测试：Agent 查询与 skills 调用都使用 MockProvider

mod common;

use std::sync::Arc;

use serde_json::json;

use common::MockProvider;
use dropin_orchestrator::providers::{MessageResponse, ProviderError};
use dropin_orchestrator::skills::SkillsRunner;
use dropin_orchestrator::workflow::{ValidationOutcome, Workflow};

/// research → plan → implement(Write + text) → tester → integrator → docs → verify
fn agent_replies() -> Vec<Result<MessageResponse, ProviderError>> {
    vec![
        MockProvider::text("research notes"),
        MockProvider::text("1. add form 2. add validation"),
        MockProvider::tool_call(
            "tu_write",
            "Write",
            json!({"file_path": "src/components/ProfileEdit.tsx", "content": "export {}"}),
        ),
        MockProvider::text("implemented"),
        MockProvider::text("tests passing"),
        MockProvider::text("integrated"),
        MockProvider::text("docs updated"),
        MockProvider::text("verified"),
    ]
}

fn skills_runner(mock: MockProvider) -> SkillsRunner {
    SkillsRunner::with_provider(Box::new(mock), "mock-model".to_string(), 4096)
}

#[tokio::test]
async fn full_workflow_passes_validation() {
    let agents = MockProvider::new(agent_replies());
    let skills = MockProvider::new(vec![MockProvider::raw(json!({
        "id": "msg_skill",
        "content": [{
            "type": "text",
            "text": "{\"status\": \"success\", \"result\": {\"valid\": true, \"issues\": []}}"
        }],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 1, "output_tokens": 1}
    }))]);

    let workflow = Workflow::new(
        Arc::new(agents.clone()),
        skills_runner(skills.clone()),
        common::test_config(),
    );
    let mut out = Vec::new();
    let report = workflow.run(&mut out).await.unwrap();

    assert_eq!(report.implemented_files, vec!["src/components/ProfileEdit.tsx"]);
    assert_eq!(report.validation, ValidationOutcome::Passed);
    assert_eq!(report.completed_steps.len(), 6);
    assert!(report.finished_at.is_some());
    assert_eq!(agents.remaining(), 0);

    // 校验请求携带 code validator skill 与改动文件
    let request = &skills.requests()[0];
    let container = request.container.as_ref().unwrap();
    assert_eq!(container.skills[0].skill_id, "skill_orchestrator_code_validator");
    let body = serde_json::to_string(&request.messages).unwrap();
    assert!(body.contains("ProfileEdit.tsx"));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Code validation: ✅ PASS"));
    assert!(text.contains("Implementation complete (1 files)"));
    assert!(text.contains("🎉 Feature implementation complete!"));
}

#[tokio::test]
async fn missing_skill_skips_validation() {
    let agents = MockProvider::new(agent_replies());
    let skills = MockProvider::new(vec![MockProvider::api_error(
        404,
        json!({"type": "error", "error": {"type": "not_found_error", "message": "Skill not found"}}),
    )]);

    let workflow = Workflow::new(
        Arc::new(agents),
        skills_runner(skills),
        common::test_config(),
    );
    let mut out = Vec::new();
    let report = workflow.run(&mut out).await.unwrap();

    assert!(matches!(report.validation, ValidationOutcome::Skipped(_)));
    assert_eq!(report.completed_steps.len(), 6);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("⚠️  Code validator skill not uploaded yet"));
}

#[tokio::test]
async fn failing_verdict_is_reported() {
    let agents = MockProvider::new(agent_replies());
    let skills = MockProvider::new(vec![MockProvider::raw(json!({
        "id": "msg_skill",
        "content": [{"type": "text", "text": "{\"result\": {\"valid\": false}}"}]
    }))]);

    let workflow = Workflow::new(
        Arc::new(agents),
        skills_runner(skills),
        common::test_config(),
    );
    let mut out = Vec::new();
    let report = workflow.run(&mut out).await.unwrap();
    assert_eq!(report.validation, ValidationOutcome::Failed);
    assert!(String::from_utf8(out).unwrap().contains("Code validation: ❌ FAIL"));
}

#[tokio::test]
async fn agent_failure_aborts_workflow() {
    let agents = MockProvider::new(vec![MockProvider::api_error(
        401,
        json!({"type": "error", "error": {"type": "authentication_error"}}),
    )]);
    let workflow = Workflow::new(
        Arc::new(agents),
        skills_runner(MockProvider::default()),
        common::test_config(),
    );
    let mut out = Vec::new();
    assert!(workflow.run(&mut out).await.is_err());
}
