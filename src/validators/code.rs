use serde::{Deserialize, Serialize};

use super::{matches_any, SkillOutput};

fn default_write_scope() -> Vec<String> {
    vec!["src/**".into(), "app/**".into(), "docs/**".into()]
}

fn default_protected_files() -> Vec<String> {
    vec![".env*".into(), "infra/**".into()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    #[default]
    Modify,
    Delete,
    /// 其余操作名（rename 等）按普通改动校验
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub operation: FileOperation,
}

impl FileChange {
    pub fn modify(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: String::new(),
            operation: FileOperation::Modify,
        }
    }
}

/// code-validator 输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeValidationInput {
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default = "default_write_scope")]
    pub write_scope: Vec<String>,
    #[serde(default = "default_protected_files")]
    pub protected_files: Vec<String>,
}

impl Default for CodeValidationInput {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            write_scope: default_write_scope(),
            protected_files: default_protected_files(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub file: String,
    pub message: String,
    pub severity: Severity,
}

impl Issue {
    fn error(file: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(file: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeValidationResult {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

fn is_typescript(path: &str) -> bool {
    path.ends_with(".ts") || path.ends_with(".tsx")
}

fn is_test_file(path: &str) -> bool {
    [".test.ts", ".test.tsx", ".spec.ts", ".spec.tsx"]
        .iter()
        .any(|suffix| path.ends_with(suffix))
}

/// `a.ts` → `a.test.ts`，`a.tsx` → `a.test.tsx`
fn sibling_test_path(path: &str) -> Option<String> {
    if let Some(stem) = path.strip_suffix(".tsx") {
        Some(format!("{}.test.tsx", stem))
    } else {
        path.strip_suffix(".ts").map(|stem| format!("{}.test.ts", stem))
    }
}

/// 写入范围按 `['a', 'b']` 的形式展示
fn format_scope(scope: &[String]) -> String {
    let quoted: Vec<String> = scope.iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", quoted.join(", "))
}

fn lint_typescript(file: &str, content: &str, warnings: &mut Vec<Issue>) {
    if content.contains(": any") || content.contains("<any>") {
        warnings.push(Issue::warning(
            file,
            "Usage of 'any' type detected - prefer specific types",
        ));
    }
    if content.contains("console.log(") {
        warnings.push(Issue::warning(
            file,
            "console.log detected - remove before production",
        ));
    }
}

pub fn validate_code(input: &CodeValidationInput) -> CodeValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for change in &input.files {
        let path = change.path.as_str();

        if !matches_any(path, &input.write_scope) {
            errors.push(Issue::error(
                path,
                format!(
                    "File is outside write scope: {}",
                    format_scope(&input.write_scope)
                ),
            ));
        }
        if matches_any(path, &input.protected_files) {
            errors.push(Issue::error(path, "Attempting to modify protected file"));
        }

        // 删除操作不检查内容和测试文件
        if change.operation == FileOperation::Delete || !is_typescript(path) {
            continue;
        }
        lint_typescript(path, &change.content, &mut warnings);

        if is_test_file(path) {
            continue;
        }
        if let Some(test_path) = sibling_test_path(path) {
            if !input.files.iter().any(|f| f.path == test_path) {
                warnings.push(Issue::warning(
                    path,
                    format!("Missing test file: {}", test_path),
                ));
            }
        }
    }

    CodeValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// 以 JSON 为输入运行 code-validator
pub fn execute(input: &serde_json::Value) -> SkillOutput<CodeValidationResult> {
    match CodeValidationInput::deserialize(input) {
        Ok(input) => SkillOutput::Success {
            result: validate_code(&input),
        },
        Err(e) => SkillOutput::Error {
            message: format!("Invalid input: {}", e),
        },
    }
}
