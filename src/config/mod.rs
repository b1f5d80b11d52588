// ==========================================
// 校车线路编排系统 - 配置层
// ==========================================
// 职责: 编排参数管理, 缺省值 + config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod routing_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use routing_config::{ConfigError, RoutingConfig, RoutingConfigReader};
