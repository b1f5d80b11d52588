// ==========================================
// 校车线路编排系统 - API 数据传输对象
// ==========================================
// 职责: 把会话状态整理成界面可直接渲染的看板视图
// ==========================================

use crate::domain::route::{Block, BlockStudent, RouteContext};
use crate::engine::session::RouteSession;
use serde::{Deserialize, Serialize};

/// 线路块视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockView {
    pub block_id: String,
    pub label: String,
    pub order_index: i32,
    pub extra_minutes: u32,
    pub student_count: usize,
    pub students: Vec<BlockStudent>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            block_id: block.block_id.clone(),
            label: block.label.clone(),
            order_index: block.order_index,
            extra_minutes: block.extra_minutes,
            student_count: block.student_count(),
            students: block.students.clone(),
        }
    }
}

/// 单车视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusLoadView {
    pub bus_id: String,
    pub bus_name: String,
    pub capacity: Option<u32>,
    pub route_id: Option<String>,
    pub occupancy: usize,
    pub estimated_minutes: u32,
    pub over_capacity: bool,
    pub over_time: bool,
    /// 有未确认的变更
    pub dirty: bool,
    pub blocks: Vec<BlockView>,
}

/// 看板视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteBoardView {
    pub context: RouteContext,
    pub strategy: String,
    pub selected_bus: Option<String>,
    /// false 表示草稿布局尚未保存
    pub persisted: bool,
    pub total_students: usize,
    pub any_capacity_exceeded: bool,
    pub any_time_exceeded: bool,
    /// 当前选中车辆能否确认
    pub can_confirm: bool,
    /// 按车辆目录顺序 (名称)
    pub buses: Vec<BusLoadView>,
}

impl RouteBoardView {
    pub fn from_session(session: &RouteSession) -> Self {
        let store = session.store();
        let aggregates = session.aggregates();

        let mut ordered: Vec<(String, String)> = session
            .catalog()
            .iter()
            .filter(|b| store.contains_bus(&b.bus_id))
            .map(|b| (b.bus_id.clone(), b.bus_name.clone()))
            .collect();
        for bus_id in store.buses().keys() {
            if !ordered.iter().any(|(id, _)| id == bus_id) {
                ordered.push((bus_id.clone(), bus_id.clone()));
            }
        }

        let buses = ordered
            .into_iter()
            .map(|(bus_id, bus_name)| {
                let load = aggregates.load(&bus_id);
                BusLoadView {
                    capacity: load.and_then(|l| l.capacity),
                    route_id: store.route_id(&bus_id).map(str::to_string),
                    occupancy: load.map_or(0, |l| l.occupancy),
                    estimated_minutes: load.map_or(0, |l| l.estimated_minutes),
                    over_capacity: load.map_or(false, |l| l.over_capacity),
                    over_time: load.map_or(false, |l| l.over_time),
                    dirty: store.is_dirty(&bus_id),
                    blocks: store.blocks(&bus_id).iter().map(BlockView::from).collect(),
                    bus_id,
                    bus_name,
                }
            })
            .collect();

        let can_confirm = session
            .selected_bus()
            .map_or(false, |bus_id| store.is_dirty(bus_id))
            && !aggregates.any_capacity_exceeded
            && store.is_persisted();

        Self {
            context: session.context().clone(),
            strategy: session.strategy_name().to_string(),
            selected_bus: session.selected_bus().map(str::to_string),
            persisted: store.is_persisted(),
            total_students: aggregates.total_students,
            any_capacity_exceeded: aggregates.any_capacity_exceeded,
            any_time_exceeded: aggregates.any_time_exceeded,
            can_confirm,
            buses,
        }
    }

    pub fn bus(&self, bus_id: &str) -> Option<&BusLoadView> {
        self.buses.iter().find(|b| b.bus_id == bus_id)
    }
}
