// ==========================================
// 校车线路编排系统 - 线路编排配置
// ==========================================
// 职责: 定义编排/容量计算所需的配置项与读取接口（不包含存储实现）
// 实现者: ConfigManager（从 config_kv 表读取）、RoutingConfig 自身（固定配置）
// ==========================================

use crate::domain::types::Direction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 配置读取错误类型
pub type ConfigError = Box<dyn Error + Send + Sync>;

// ==========================================
// RoutingConfig - 编排参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// 特别日/假期编排时每个线路块的学员数
    pub block_chunk_size: usize,
    /// 线路块附加时长: 每名学员分钟数
    pub per_student_minutes: f64,
    /// 线路块附加时长下限
    pub min_block_minutes: u32,
    /// 上学方向基础时长
    pub pickup_base_minutes: u32,
    /// 放学方向基础时长
    pub dropoff_base_minutes: u32,
    /// 线路估算总时长上限 (超出即告警)
    pub max_route_minutes: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            block_chunk_size: 5,
            per_student_minutes: 2.0,
            min_block_minutes: 2,
            pickup_base_minutes: 20,
            dropoff_base_minutes: 20,
            max_route_minutes: 60,
        }
    }
}

impl RoutingConfig {
    /// 指定方向的基础时长
    pub fn base_minutes(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Pickup => self.pickup_base_minutes,
            Direction::Dropoff => self.dropoff_base_minutes,
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), String> {
        if self.block_chunk_size == 0 {
            return Err("block_chunk_size 必须大于 0".to_string());
        }
        if !self.per_student_minutes.is_finite() || self.per_student_minutes < 0.0 {
            return Err(format!("per_student_minutes 无效: {}", self.per_student_minutes));
        }
        Ok(())
    }
}

// ==========================================
// RoutingConfigReader Trait
// ==========================================
#[async_trait]
pub trait RoutingConfigReader: Send + Sync {
    /// 读取完整编排配置
    ///
    /// # 默认值
    /// - 缺失的键取 RoutingConfig::default() 对应值
    async fn load_routing_config(&self) -> Result<RoutingConfig, ConfigError>;
}

/// 固定配置 (测试与离线场景)
#[async_trait]
impl RoutingConfigReader for RoutingConfig {
    async fn load_routing_config(&self) -> Result<RoutingConfig, ConfigError> {
        self.validate()?;
        Ok(self.clone())
    }
}
