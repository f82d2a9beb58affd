//! Agent Skills 引用与 Messages API skills runner
//!
//! Skill 只是一个 `{type, skill_id, version}` 引用，放进请求的
//! `container.skills` 数组里，执行发生在服务端容器中。

pub mod runner;

use serde::{Deserialize, Serialize};

pub use runner::{create_skills_runner, SkillsError, SkillsRunner, SkillsRunnerConfig};

/// 未指定版本时使用的版本号
pub const LATEST: &str = "latest";

/// 仓库自带的自定义 skill ID（需先上传）
pub const CODE_VALIDATOR_SKILL_ID: &str = "skill_orchestrator_code_validator";
pub const SCHEMA_VALIDATOR_SKILL_ID: &str = "skill_orchestrator_schema_validator";

/// Skill 来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Anthropic,
    Custom,
}

/// container.skills 中的单个 skill 引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(rename = "type")]
    pub r#type: SkillType,
    pub skill_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Anthropic 预置 skill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnthropicSkill {
    Pdf,
    Xlsx,
    Pptx,
    Docx,
}

impl AnthropicSkill {
    pub const ALL: [AnthropicSkill; 4] = [
        AnthropicSkill::Pdf,
        AnthropicSkill::Xlsx,
        AnthropicSkill::Pptx,
        AnthropicSkill::Docx,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AnthropicSkill::Pdf => "pdf",
            AnthropicSkill::Xlsx => "xlsx",
            AnthropicSkill::Pptx => "pptx",
            AnthropicSkill::Docx => "docx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnthropicSkill::Pdf => "PDF",
            AnthropicSkill::Xlsx => "Excel",
            AnthropicSkill::Pptx => "PowerPoint",
            AnthropicSkill::Docx => "Word",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnthropicSkill::Pdf => "Process PDF documents",
            AnthropicSkill::Xlsx => "Process Excel spreadsheets",
            AnthropicSkill::Pptx => "Process PowerPoint presentations",
            AnthropicSkill::Docx => "Process Word documents",
        }
    }

    /// 按 ID 查找（大小写不敏感）
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.id().eq_ignore_ascii_case(id))
    }

    pub fn skill(&self) -> Skill {
        Skill {
            r#type: SkillType::Anthropic,
            skill_id: self.id().to_string(),
            version: Some(LATEST.to_string()),
        }
    }
}

impl From<AnthropicSkill> for Skill {
    fn from(s: AnthropicSkill) -> Self {
        s.skill()
    }
}

/// 构造自定义 skill 引用，version 缺省为 "latest"
pub fn custom_skill(skill_id: &str, version: Option<&str>) -> Skill {
    Skill {
        r#type: SkillType::Custom,
        skill_id: skill_id.to_string(),
        version: Some(version.unwrap_or(LATEST).to_string()),
    }
}

/// 解析 CLI 上的 `id[@version]`
pub fn parse_custom_skill(spec: &str) -> Skill {
    match spec.split_once('@') {
        Some((id, version)) if !version.is_empty() => custom_skill(id, Some(version)),
        Some((id, _)) => custom_skill(id, None),
        None => custom_skill(spec, None),
    }
}
