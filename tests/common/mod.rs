//! 集成测试公共辅助函数

// 每个集成测试文件只使用 common 的一部分，未用到的辅助函数属于预期 dead_code
#![allow(dead_code)]

pub mod mock_provider;
pub use mock_provider::MockProvider;

use dropin_orchestrator::config::{Config, DefaultConfig};

/// 最小测试配置：固定模型名，不读取任何文件
pub fn test_config() -> Config {
    Config {
        default: DefaultConfig {
            model: "mock-model".to_string(),
            ..DefaultConfig::default()
        },
        ..Config::default()
    }
}
