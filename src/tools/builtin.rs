//! 宿主运行时内置工具表
//!
//! 这些工具只在 Agent 的工具列表里出现，本进程不执行。query 引擎把
//! 它们声明给模型，调用时回填 "not available in this runtime" 错误。

use serde_json::json;

use crate::providers::ToolSpec;

pub struct BuiltinTool {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [&'static str],
    pub required: &'static [&'static str],
}

pub static BUILTIN_TOOLS: &[BuiltinTool] = &[
    BuiltinTool {
        name: "Read",
        description: "Read a file from the workspace",
        params: &["file_path"],
        required: &["file_path"],
    },
    BuiltinTool {
        name: "Write",
        description: "Create or overwrite a file in the workspace",
        params: &["file_path", "content"],
        required: &["file_path", "content"],
    },
    BuiltinTool {
        name: "Edit",
        description: "Replace an exact string in a workspace file",
        params: &["file_path", "old_string", "new_string"],
        required: &["file_path", "old_string", "new_string"],
    },
    BuiltinTool {
        name: "Grep",
        description: "Search file contents with a regular expression",
        params: &["pattern", "path"],
        required: &["pattern"],
    },
    BuiltinTool {
        name: "Glob",
        description: "Find files matching a glob pattern",
        params: &["pattern", "path"],
        required: &["pattern"],
    },
    BuiltinTool {
        name: "Bash",
        description: "Run a shell command in the workspace",
        params: &["command"],
        required: &["command"],
    },
    BuiltinTool {
        name: "WebSearch",
        description: "Search the web",
        params: &["query"],
        required: &["query"],
    },
    BuiltinTool {
        name: "WebFetch",
        description: "Fetch a web page and return its content",
        params: &["url"],
        required: &["url"],
    },
];

impl BuiltinTool {
    pub fn spec(&self) -> ToolSpec {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .map(|p| (p.to_string(), json!({"type": "string"})))
            .collect();
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": self.required,
            }),
        }
    }
}

pub fn find_builtin(name: &str) -> Option<&'static BuiltinTool> {
    BUILTIN_TOOLS.iter().find(|t| t.name == name)
}
