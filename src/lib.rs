pub mod agent;
pub mod config;
pub mod demos;
pub mod landing;
pub mod mcp;
pub mod providers;
pub mod security;
pub mod skills;
pub mod tools;
pub mod validators;
pub mod workflow;
