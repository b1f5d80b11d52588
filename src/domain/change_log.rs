// ==========================================
// 校车线路编排系统 - 线路变更日志领域模型
// ==========================================
// 红线: 每次线路变更必须记录, 记录只追加, 不修改不删除
// 对齐: route_change_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ChangeLogEntry - 线路变更日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub log_id: String,           // 日志ID (UUID)
    pub route_id: String,         // 关联线路
    pub action: String,           // 操作类型 (存储为字符串)
    pub payload_json: JsonValue,  // 操作参数
    pub created_at: NaiveDateTime,
}

// ==========================================
// ChangeAction - 变更操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    MoveStudent,      // 学员跨线路块移动
    MoveBlockBus,     // 线路块换车
    ReorderBlock,     // 线路块重新排序
    ConfirmRoute,     // 线路确认
    SaveLayout,       // 草稿布局落库
    SweepEmptyBlocks, // 清理空线路块
}

impl ChangeAction {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::MoveStudent => "move_student",
            ChangeAction::MoveBlockBus => "move_block_bus",
            ChangeAction::ReorderBlock => "reorder_block",
            ChangeAction::ConfirmRoute => "confirm_route",
            ChangeAction::SaveLayout => "save_layout",
            ChangeAction::SweepEmptyBlocks => "sweep_empty_blocks",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "move_student" => Some(ChangeAction::MoveStudent),
            "move_block_bus" => Some(ChangeAction::MoveBlockBus),
            "reorder_block" => Some(ChangeAction::ReorderBlock),
            "confirm_route" => Some(ChangeAction::ConfirmRoute),
            "save_layout" => Some(ChangeAction::SaveLayout),
            "sweep_empty_blocks" => Some(ChangeAction::SweepEmptyBlocks),
            _ => None,
        }
    }
}

impl ChangeLogEntry {
    /// 创建新的变更日志 (生成 UUID 与当前时间戳)
    pub fn new<T: Serialize>(route_id: &str, action: ChangeAction, payload: &T) -> Self {
        Self {
            log_id: uuid::Uuid::new_v4().to_string(),
            route_id: route_id.to_string(),
            action: action.as_str().to_string(),
            payload_json: serde_json::to_value(payload).unwrap_or(JsonValue::Null),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn action_type(&self) -> Option<ChangeAction> {
        ChangeAction::parse(&self.action)
    }
}
