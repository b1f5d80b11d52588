// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use bus_route_planner::config::{ConfigError, RoutingConfig, RoutingConfigReader};

/// 总是读取失败的配置源 (模拟配置库不可用)
#[derive(Debug, Clone, Default)]
pub struct UnavailableConfig;

#[async_trait]
impl RoutingConfigReader for UnavailableConfig {
    async fn load_routing_config(&self) -> Result<RoutingConfig, ConfigError> {
        Err("config_kv 不可用".into())
    }
}

/// 测试常用配置: 默认值, 可覆写线路块人数
pub fn routing_config(block_chunk_size: usize) -> RoutingConfig {
    RoutingConfig {
        block_chunk_size,
        ..RoutingConfig::default()
    }
}
