// ==========================================
// 校车线路编排系统 - 引擎层错误类型
// ==========================================
// 红线: 引擎不吞错误, 每个失败都有明确类别, 由调用方决定如何提示
// ==========================================

use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 失败类别 (供通知/界面提示使用)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Persistence,   // 存储读写失败
    NotFound,      // 线路/线路块/车辆不存在
    Validation,    // 请求本身不合法
    Blocked,       // 条件不满足 (超载、无待确认变更)
    Configuration, // 配置或上下文不完整
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("数据访问失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("编排上下文不完整: {0}")]
    IncompleteContext(String),

    #[error("没有可用的启用车辆")]
    NoActiveBuses,

    #[error("自动编排过程失败: {0}")]
    Procedure(String),

    #[error("车辆 {bus_id} 在当前上下文中没有线路")]
    RouteNotFound { bus_id: String },

    #[error("线路块不存在: {0}")]
    BlockNotFound(String),

    #[error("车辆不在当前看板中: {0}")]
    UnknownBus(String),

    #[error("学员 {student_id} 不在线路块 {block_id} 中")]
    StudentNotInBlock { student_id: String, block_id: String },

    #[error("学员 {0} 在同一线路上下文中重复出现")]
    DuplicateStudent(String),

    #[error("线路块 {0} 同时出现在多辆车上")]
    DuplicateBlock(String),

    #[error("无效操作: {0}")]
    InvalidMove(String),

    #[error("未选择车辆")]
    NoBusSelected,

    #[error("没有待确认的变更")]
    NothingToConfirm,

    #[error("载客超限, 无法确认: {buses:?}")]
    CapacityExceeded { buses: Vec<String> },

    #[error("草稿布局尚未保存")]
    LayoutNotSaved,

    #[error("布局已保存, 无需重复保存")]
    AlreadySaved,
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::Repository(RepositoryError::NotFound { .. }) => FailureKind::NotFound,
            EngineError::Repository(_) | EngineError::Procedure(_) => FailureKind::Persistence,
            EngineError::Config(_) | EngineError::IncompleteContext(_) | EngineError::NoActiveBuses => {
                FailureKind::Configuration
            }
            EngineError::RouteNotFound { .. }
            | EngineError::BlockNotFound(_)
            | EngineError::UnknownBus(_)
            | EngineError::StudentNotInBlock { .. } => FailureKind::NotFound,
            EngineError::DuplicateStudent(_)
            | EngineError::DuplicateBlock(_)
            | EngineError::InvalidMove(_)
            | EngineError::NoBusSelected => FailureKind::Validation,
            EngineError::NothingToConfirm
            | EngineError::CapacityExceeded { .. }
            | EngineError::LayoutNotSaved
            | EngineError::AlreadySaved => FailureKind::Blocked,
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
