// ==========================================
// 校车线路编排系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 把仓储/引擎错误转换为面向界面的错误消息
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    /// 载客超限 (确认被阻止)
    #[error("载客超限: buses={buses:?}")]
    CapacityConstraintViolation { buses: Vec<String> },

    #[error("尚未打开线路看板")]
    NoActiveBoard,

    #[error("自动编排失败: {0}")]
    AssignmentFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Repository(e) => ApiError::from(e),
            EngineError::Config(msg) => ApiError::ConfigError(msg),
            EngineError::Procedure(msg) => ApiError::AssignmentFailed(msg),
            EngineError::CapacityExceeded { buses } => ApiError::CapacityConstraintViolation { buses },
            e @ (EngineError::RouteNotFound { .. }
            | EngineError::BlockNotFound(_)
            | EngineError::UnknownBus(_)
            | EngineError::StudentNotInBlock { .. }) => ApiError::NotFound(e.to_string()),
            e @ (EngineError::IncompleteContext(_)
            | EngineError::DuplicateStudent(_)
            | EngineError::DuplicateBlock(_)
            | EngineError::InvalidMove(_)
            | EngineError::NoBusSelected) => ApiError::InvalidInput(e.to_string()),
            e @ (EngineError::NoActiveBuses
            | EngineError::NothingToConfirm
            | EngineError::LayoutNotSaved
            | EngineError::AlreadySaved) => ApiError::BusinessRuleViolation(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
