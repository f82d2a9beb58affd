//! 仓库自带 custom skill 的本地实现
//!
//! 输入输出与上传到服务端的 skill 一致：`{status, result}` 或
//! `{status: "error", message}`。

pub mod code;
pub mod schema;

use regex::Regex;
use serde::Serialize;

pub use code::{validate_code, CodeValidationInput, CodeValidationResult, FileChange, Issue};
pub use schema::{validate_schema, SchemaError, SchemaValidationResult};

/// skill 输出外壳
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SkillOutput<T> {
    Success { result: T },
    Error { message: String },
}

impl<T: Serialize> SkillOutput<T> {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"status": "error", "message": e.to_string()})
        })
    }
}

/// 把写入范围 glob 转成前缀锚定的正则
///
/// `**` 匹配任意字符（含 `/`），`*` 匹配单层路径，其余字符按字面匹配。
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                re.push_str(".*");
            } else {
                re.push_str("[^/]*");
            }
        } else {
            re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    Regex::new(&re)
}

/// 路径是否匹配任一 glob
pub fn matches_any(path: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .filter_map(|p| glob_to_regex(p).ok())
        .any(|re| re.is_match(path))
}
