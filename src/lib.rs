// ==========================================
// 校车线路编排系统 - 核心库
// ==========================================
// 系统定位: 语言培训机构管理后台的校车线路编排与载客管理
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 编排规则
pub mod engine;

// 配置层 - 编排参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 看板接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Direction, ScheduleMode, TransportMode};

// 领域实体
pub use domain::{
    Block, BlockStudent, Bus, ChangeAction, ChangeLogEntry, EligibleStudent, Route, RouteContext,
    RouteKey, RouteSlot, Student, TimeSlot,
};

// 引擎
pub use engine::{
    CapacityCalculator, EligibilityResolver, EngineError, RouteAggregates, RouteSession,
    RouteStore,
};

// API
pub use api::{ApiError, RouteApi, RouteBoardView};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "校车线路编排系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
