// ==========================================
// 校车线路编排系统 - 车辆与时段目录
// ==========================================
// 对齐: bus / time_slot 表
// ==========================================

use crate::domain::types::Direction;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Bus - 校车
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub bus_id: String,   // 车辆ID
    pub bus_name: String, // 车辆名称 (如 "1号车")
    pub capacity: u32,    // 最大载客数
    pub campus: String,   // 所属校区
    pub is_active: bool,  // 是否启用
}

// ==========================================
// TimeSlot - 接送时段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub slot_id: String,
    pub label: String,        // 显示名 (如 "下午第一班")
    pub base_time: NaiveTime, // 基准时间
    pub campus: String,
    pub direction: Direction,
    pub is_active: bool,
    pub sort_order: i32,
}

impl Bus {
    /// 给定载客数是否超出容量
    ///
    /// 等于容量不算超载, 超出 1 人即超载
    pub fn is_over_capacity(&self, occupancy: usize) -> bool {
        occupancy > self.capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_boundary() {
        let bus = Bus {
            bus_id: "B1".to_string(),
            bus_name: "1号车".to_string(),
            capacity: 12,
            campus: "MAIN".to_string(),
            is_active: true,
        };
        assert!(!bus.is_over_capacity(12));
        assert!(bus.is_over_capacity(13));
    }
}
