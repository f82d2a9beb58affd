pub mod policy;

pub use policy::{PermissionMode, ToolDecision, ToolPolicy};
