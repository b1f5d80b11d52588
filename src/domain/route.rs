// ==========================================
// 校车线路编排系统 - 线路领域模型
// ==========================================
// 红线: 一个线路块 (Block) 同一时刻只属于一条线路 (Route)
// 红线: 同一线路上下文内, 一个学员最多出现在一个线路块中
// 红线: 载客数只由线路块成员推导, 不单独存储
// ==========================================

use crate::domain::types::{weekday_code, Direction, ScheduleMode};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// RouteSlot - 时段或特别日期
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RouteSlot {
    TimeSlot(String),        // 常规: 时段ID
    SpecialDate(NaiveDate),  // 特别日/假期: 日期
}

impl RouteSlot {
    /// 数据库 slot_key 列 ("slot:<id>" / "date:YYYY-MM-DD")
    pub fn as_key(&self) -> String {
        match self {
            RouteSlot::TimeSlot(id) => format!("slot:{}", id),
            RouteSlot::SpecialDate(date) => format!("date:{}", date.format("%Y-%m-%d")),
        }
    }

    pub fn parse_key(key: &str) -> Result<Self, String> {
        if let Some(id) = key.strip_prefix("slot:") {
            if id.is_empty() {
                return Err(format!("slot_key 缺少时段ID: {}", key));
            }
            return Ok(RouteSlot::TimeSlot(id.to_string()));
        }
        if let Some(date) = key.strip_prefix("date:") {
            return NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(RouteSlot::SpecialDate)
                .map_err(|e| format!("slot_key 日期无效 {}: {}", key, e));
        }
        Err(format!("无法识别的 slot_key: {}", key))
    }
}

// ==========================================
// RouteKey - 线路复合键
// ==========================================
// (车辆, 方向, 时段或日期, 星期, 学期) 唯一确定一条线路
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub bus_id: String,
    pub direction: Direction,
    pub slot: RouteSlot,
    pub weekday: Weekday,
    pub semester: String,
}

impl RouteKey {
    pub fn weekday_code(&self) -> &'static str {
        weekday_code(self.weekday)
    }
}

// ==========================================
// RouteContext - 线路编排上下文 (看板筛选条件)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteContext {
    pub semester: String,
    pub campus: Option<String>,
    pub direction: Direction,
    pub schedule_mode: ScheduleMode,
    pub weekday: Weekday,
    pub time_slot_id: Option<String>,
    pub special_date: Option<NaiveDate>,
}

impl RouteContext {
    /// 常规排班上下文
    pub fn regular(
        semester: impl Into<String>,
        campus: impl Into<String>,
        direction: Direction,
        weekday: Weekday,
        time_slot_id: impl Into<String>,
    ) -> Self {
        Self {
            semester: semester.into(),
            campus: Some(campus.into()),
            direction,
            schedule_mode: ScheduleMode::Regular,
            weekday,
            time_slot_id: Some(time_slot_id.into()),
            special_date: None,
        }
    }

    /// 特别日/假期上下文 (星期由日期推出)
    pub fn dated(
        semester: impl Into<String>,
        campus: Option<String>,
        direction: Direction,
        schedule_mode: ScheduleMode,
        date: NaiveDate,
    ) -> Self {
        Self {
            semester: semester.into(),
            campus,
            direction,
            schedule_mode,
            weekday: date.weekday(),
            time_slot_id: None,
            special_date: Some(date),
        }
    }

    /// 当前上下文对应的时段/日期; 条件不完整时为 None
    pub fn slot(&self) -> Option<RouteSlot> {
        if self.schedule_mode.is_date_scoped() {
            self.special_date.map(RouteSlot::SpecialDate)
        } else {
            self.time_slot_id
                .as_ref()
                .filter(|id| !id.trim().is_empty())
                .map(|id| RouteSlot::TimeSlot(id.clone()))
        }
    }

    /// 指定车辆在本上下文中的线路键
    pub fn route_key(&self, bus_id: &str) -> Option<RouteKey> {
        self.slot().map(|slot| RouteKey {
            bus_id: bus_id.to_string(),
            direction: self.direction,
            slot,
            weekday: self.weekday,
            semester: self.semester.clone(),
        })
    }
}

// ==========================================
// Route - 线路 (对齐 bus_route 表)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub key: RouteKey,
    pub confirmed: bool,
    pub estimated_minutes: u32, // 最近一次确认时的估算总时长
    pub updated_at: NaiveDateTime,
}

// ==========================================
// BlockStudent - 线路块成员
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStudent {
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub campus: String,
    pub event_time: Option<NaiveTime>,
}

// ==========================================
// Block - 线路块 (有序停靠组)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: String,
    pub route_id: Option<String>, // 草稿布局中尚未落库时为 None
    pub label: String,
    pub order_index: i32,
    pub extra_minutes: u32, // 对线路总时长的附加贡献
    pub students: Vec<BlockStudent>,
}

impl Block {
    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn contains_student(&self, student_id: &str) -> bool {
        self.students.iter().any(|s| s.student_id == student_id)
    }
}
