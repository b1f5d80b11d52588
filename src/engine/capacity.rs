// ==========================================
// 校车线路编排系统 - 载客与时长计算
// ==========================================
// 职责: 由当前看板快照重新计算每辆车的载客数与估算总时长
// 红线: 每次变更后整体重算, 不做增量修补
// 红线: 载客数 == 容量不告警, 容量 + 1 才告警
// ==========================================

use crate::config::RoutingConfig;
use crate::domain::bus::Bus;
use crate::domain::route::Block;
use crate::domain::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 单车载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLoad {
    pub bus_id: String,
    pub capacity: Option<u32>, // 车辆目录中没有该车时为 None
    pub block_count: usize,
    pub occupancy: usize,
    pub estimated_minutes: u32,
    pub over_capacity: bool,
    pub over_time: bool,
}

/// 看板汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAggregates {
    pub loads: BTreeMap<String, BusLoad>,
    pub total_students: usize,
    pub any_capacity_exceeded: bool,
    pub any_time_exceeded: bool,
}

impl RouteAggregates {
    pub fn load(&self, bus_id: &str) -> Option<&BusLoad> {
        self.loads.get(bus_id)
    }

    pub fn over_capacity_buses(&self) -> Vec<String> {
        self.loads
            .values()
            .filter(|l| l.over_capacity)
            .map(|l| l.bus_id.clone())
            .collect()
    }

    pub fn over_time_buses(&self) -> Vec<String> {
        self.loads
            .values()
            .filter(|l| l.over_time)
            .map(|l| l.bus_id.clone())
            .collect()
    }
}

// ==========================================
// CapacityCalculator - 纯计算, 无副作用
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityCalculator {
    base_minutes: u32,
    max_route_minutes: u32,
}

impl CapacityCalculator {
    pub fn new(config: &RoutingConfig, direction: Direction) -> Self {
        Self {
            base_minutes: config.base_minutes(direction),
            max_route_minutes: config.max_route_minutes,
        }
    }

    /// 估算总时长 = 方向基础时长 + Σ 线路块附加时长
    pub fn estimated_minutes(&self, blocks: &[Block]) -> u32 {
        blocks
            .iter()
            .fold(self.base_minutes, |acc, b| acc.saturating_add(b.extra_minutes))
    }

    pub fn compute(&self, buses: &BTreeMap<String, Vec<Block>>, catalog: &[Bus]) -> RouteAggregates {
        let by_id: HashMap<&str, &Bus> = catalog.iter().map(|b| (b.bus_id.as_str(), b)).collect();

        let mut aggregates = RouteAggregates::default();
        for (bus_id, blocks) in buses {
            let occupancy: usize = blocks.iter().map(Block::student_count).sum();
            let bus = by_id.get(bus_id.as_str()).copied();
            let estimated_minutes = self.estimated_minutes(blocks);

            let load = BusLoad {
                bus_id: bus_id.clone(),
                capacity: bus.map(|b| b.capacity),
                block_count: blocks.len(),
                occupancy,
                estimated_minutes,
                over_capacity: bus.map_or(false, |b| b.is_over_capacity(occupancy)),
                over_time: estimated_minutes > self.max_route_minutes,
            };

            aggregates.total_students += occupancy;
            aggregates.any_capacity_exceeded |= load.over_capacity;
            aggregates.any_time_exceeded |= load.over_time;
            aggregates.loads.insert(bus_id.clone(), load);
        }
        aggregates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::route::BlockStudent;

    fn block(id: &str, students: usize, extra: u32) -> Block {
        Block {
            block_id: id.to_string(),
            route_id: None,
            label: id.to_string(),
            order_index: 1,
            extra_minutes: extra,
            students: (0..students)
                .map(|i| BlockStudent {
                    student_id: format!("{}-{}", id, i),
                    student_name: String::new(),
                    class_name: String::new(),
                    campus: String::new(),
                    event_time: None,
                })
                .collect(),
        }
    }

    fn bus(id: &str, capacity: u32) -> Bus {
        Bus {
            bus_id: id.to_string(),
            bus_name: id.to_string(),
            capacity,
            campus: "EAST".to_string(),
            is_active: true,
        }
    }

    fn calculator() -> CapacityCalculator {
        CapacityCalculator::new(&RoutingConfig::default(), Direction::Pickup)
    }

    #[test]
    fn test_occupancy_is_sum_of_block_members() {
        let mut buses = BTreeMap::new();
        buses.insert("B1".to_string(), vec![block("K1", 5, 10), block("K2", 3, 6)]);
        buses.insert("B2".to_string(), vec![]);

        let agg = calculator().compute(&buses, &[bus("B1", 12), bus("B2", 12)]);
        let b1 = agg.load("B1").unwrap();
        assert_eq!(b1.occupancy, 8);
        assert_eq!(b1.block_count, 2);
        assert_eq!(b1.estimated_minutes, 20 + 16);
        assert_eq!(agg.load("B2").unwrap().occupancy, 0);
        assert_eq!(agg.load("B2").unwrap().estimated_minutes, 20);
        assert_eq!(agg.total_students, 8);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut buses = BTreeMap::new();
        buses.insert("B1".to_string(), vec![block("K1", 12, 2)]);
        let at_cap = calculator().compute(&buses, &[bus("B1", 12)]);
        assert!(!at_cap.any_capacity_exceeded);

        buses.insert("B1".to_string(), vec![block("K1", 12, 2), block("K2", 1, 2)]);
        let over = calculator().compute(&buses, &[bus("B1", 12)]);
        assert!(over.any_capacity_exceeded);
        assert_eq!(over.over_capacity_buses(), vec!["B1".to_string()]);
    }

    #[test]
    fn test_time_ceiling() {
        let mut buses = BTreeMap::new();
        buses.insert("B1".to_string(), vec![block("K1", 5, 20), block("K2", 5, 20)]);
        // 20 + 40 = 60, 未超
        assert!(!calculator().compute(&buses, &[bus("B1", 30)]).any_time_exceeded);

        buses.get_mut("B1").unwrap().push(block("K3", 1, 2));
        let agg = calculator().compute(&buses, &[bus("B1", 30)]);
        assert!(agg.any_time_exceeded);
        assert_eq!(agg.over_time_buses(), vec!["B1".to_string()]);
    }

    #[test]
    fn test_unknown_bus_never_raises_capacity_alert() {
        let mut buses = BTreeMap::new();
        buses.insert("GHOST".to_string(), vec![block("K1", 40, 2)]);
        let agg = calculator().compute(&buses, &[]);
        assert_eq!(agg.load("GHOST").unwrap().capacity, None);
        assert!(!agg.any_capacity_exceeded);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut buses = BTreeMap::new();
        buses.insert("B1".to_string(), vec![block("K1", 4, 8)]);
        buses.insert("B2".to_string(), vec![block("K2", 9, 18)]);
        let catalog = [bus("B1", 5), bus("B2", 8)];
        let first = calculator().compute(&buses, &catalog);
        let second = calculator().compute(&buses, &catalog);
        assert_eq!(first, second);
    }
}
