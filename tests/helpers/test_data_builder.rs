// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use bus_route_planner::domain::bus::{Bus, TimeSlot};
use bus_route_planner::domain::route::{Block, BlockStudent};
use bus_route_planner::domain::student::{Student, TransportEvent};
use bus_route_planner::domain::types::{Direction, TransportMode};
use chrono::{NaiveDate, NaiveTime};

pub const CAMPUS: &str = "EAST";
pub const SEMESTER: &str = "2026-S2";
pub const SLOT_ID: &str = "TS-0730";

// ==========================================
// Bus 构建器
// ==========================================

pub struct BusBuilder {
    bus_id: String,
    bus_name: String,
    capacity: u32,
    campus: String,
    is_active: bool,
}

impl BusBuilder {
    pub fn new(bus_id: &str) -> Self {
        Self {
            bus_id: bus_id.to_string(),
            bus_name: format!("Bus {}", bus_id),
            capacity: 12,
            campus: CAMPUS.to_string(),
            is_active: true,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn campus(mut self, campus: &str) -> Self {
        self.campus = campus.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn build(self) -> Bus {
        Bus {
            bus_id: self.bus_id,
            bus_name: self.bus_name,
            capacity: self.capacity,
            campus: self.campus,
            is_active: self.is_active,
        }
    }
}

// ==========================================
// Student 构建器
// ==========================================

pub struct StudentBuilder {
    student_id: String,
    student_name: String,
    class_name: String,
    campus: String,
    is_active: bool,
    pickup_mode: TransportMode,
    dropoff_mode: TransportMode,
}

impl StudentBuilder {
    pub fn new(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            student_name: format!("Student {}", student_id),
            class_name: "G1-A".to_string(),
            campus: CAMPUS.to_string(),
            is_active: true,
            pickup_mode: TransportMode::Bus,
            dropoff_mode: TransportMode::Bus,
        }
    }

    pub fn class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn self_pickup(mut self) -> Self {
        self.pickup_mode = TransportMode::SelfTransport;
        self
    }

    pub fn build(self) -> Student {
        Student {
            student_id: self.student_id,
            student_name: self.student_name,
            class_name: self.class_name,
            campus: self.campus,
            is_active: self.is_active,
            pickup_mode: self.pickup_mode,
            dropoff_mode: self.dropoff_mode,
        }
    }
}

// ==========================================
// 其它快捷构造
// ==========================================

pub fn pickup_slot() -> TimeSlot {
    TimeSlot {
        slot_id: SLOT_ID.to_string(),
        label: "早班".to_string(),
        base_time: hm(7, 30),
        campus: CAMPUS.to_string(),
        direction: Direction::Pickup,
        is_active: true,
        sort_order: 1,
    }
}

pub fn pickup_event(event_id: &str, student_id: &str, date: NaiveDate, time: NaiveTime) -> TransportEvent {
    TransportEvent {
        event_id: event_id.to_string(),
        student_id: student_id.to_string(),
        event_date: date,
        direction: Direction::Pickup,
        event_time: time,
        is_active: true,
    }
}

/// 线路块 (成员只需 student_id, 其余字段随意)
pub fn block(block_id: &str, order_index: i32, student_ids: &[&str]) -> Block {
    Block {
        block_id: block_id.to_string(),
        route_id: None,
        label: block_id.to_string(),
        order_index,
        extra_minutes: 2 * student_ids.len() as u32,
        students: student_ids
            .iter()
            .map(|id| BlockStudent {
                student_id: id.to_string(),
                student_name: format!("Student {}", id),
                class_name: "G1-A".to_string(),
                campus: CAMPUS.to_string(),
                event_time: None,
            })
            .collect(),
    }
}

/// 学员ID序列: S01, S02, ...
pub fn student_ids(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("S{:02}", i)).collect()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn special_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 3).unwrap()
}
