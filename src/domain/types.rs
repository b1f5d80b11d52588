// ==========================================
// 校车线路编排系统 - 基础类型定义
// ==========================================
// 职责: 方向/乘车方式/排班模式等枚举, 以及与数据库字符串的互转
// 红线: 数据库中只存 as_str() 的结果, 不存 Debug 输出
// ==========================================

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// Direction - 接送方向
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Pickup,  // 上学接送 (家 → 校区)
    Dropoff, // 放学送回 (校区 → 家)
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Pickup => "PICKUP",
            Direction::Dropoff => "DROPOFF",
        }
    }

    /// 线路块标签使用的短名
    pub fn short_label(&self) -> &'static str {
        match self {
            Direction::Pickup => "pickup",
            Direction::Dropoff => "dropoff",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PICKUP" => Ok(Direction::Pickup),
            "DROPOFF" => Ok(Direction::Dropoff),
            other => Err(format!("未知接送方向: {}", other)),
        }
    }
}

// ==========================================
// TransportMode - 学员乘车方式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Bus,           // 乘坐校车
    SelfTransport, // 自行往返
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Bus => "bus",
            TransportMode::SelfTransport => "self",
        }
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bus" => Ok(TransportMode::Bus),
            "self" => Ok(TransportMode::SelfTransport),
            other => Err(format!("未知乘车方式: {}", other)),
        }
    }
}

// ==========================================
// ScheduleMode - 排班模式
// ==========================================
// Regular: 按周课表 (星期 + 时段)
// Special/Vacation: 按日期的临时接送事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Regular,
    Special,
    Vacation,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Regular => "regular",
            ScheduleMode::Special => "special",
            ScheduleMode::Vacation => "vacation",
        }
    }

    /// 是否按日期排班 (特别日/假期)
    pub fn is_date_scoped(&self) -> bool {
        !matches!(self, ScheduleMode::Regular)
    }
}

impl Default for ScheduleMode {
    fn default() -> Self {
        ScheduleMode::Regular
    }
}

impl FromStr for ScheduleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(ScheduleMode::Regular),
            "special" => Ok(ScheduleMode::Special),
            "vacation" => Ok(ScheduleMode::Vacation),
            other => Err(format!("未知排班模式: {}", other)),
        }
    }
}

// ==========================================
// 星期 <-> 数据库字符串
// ==========================================

/// 星期的存储形式 ("Mon".."Sun")
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// 解析星期 (兼容 "Mon" / "monday" / "MON")
pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("无效星期: {}", s))
}
