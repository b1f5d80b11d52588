// ==========================================
// 校车线路编排系统 - 学员领域模型 (外部数据)
// ==========================================
// 学员主数据/周课表/临时接送事件由教务系统维护,
// 本模块只读取, 用于乘车资格判定
// ==========================================

use crate::domain::types::{Direction, TransportMode};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学员
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub campus: String,
    pub is_active: bool,
    pub pickup_mode: TransportMode,  // 上学方式
    pub dropoff_mode: TransportMode, // 放学方式
}

impl Student {
    /// 指定方向的乘车方式
    pub fn mode_for(&self, direction: Direction) -> TransportMode {
        match direction {
            Direction::Pickup => self.pickup_mode,
            Direction::Dropoff => self.dropoff_mode,
        }
    }
}

// ==========================================
// WeeklySchedule - 周课表条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub student_id: String,
    pub weekday: Weekday,
    pub time_slot_id: String,
}

// ==========================================
// TransportEvent - 按日期的接送覆盖事件
// ==========================================
// 用于特别日/假期排班: 指定日期 + 方向 + 明确时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEvent {
    pub event_id: String,
    pub student_id: String,
    pub event_date: NaiveDate,
    pub direction: Direction,
    pub event_time: NaiveTime,
    pub is_active: bool,
}

// ==========================================
// EligibleStudent - 资格判定输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleStudent {
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub campus: String,
    pub event_time: Option<NaiveTime>, // 仅特别日/假期模式有值
}
