// ==========================================
// 校车线路编排系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod assignment_procedure_repo;
pub mod bus_repo;
pub mod change_log_repo;
pub mod error;
pub mod route_repo;
pub mod student_repo;

// 重导出核心仓储
pub use assignment_procedure_repo::{
    AssignmentProcedureParams, AssignmentProcedureRepository, AssignmentProcedureSummary,
};
pub use bus_repo::{BusRepository, TimeSlotRepository};
pub use change_log_repo::ChangeLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use route_repo::RouteRepository;
pub use student_repo::StudentRepository;
