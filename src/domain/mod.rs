// ==========================================
// 校车线路编排系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod bus;
pub mod change_log;
pub mod route;
pub mod student;
pub mod types;

// 重导出核心类型
pub use bus::{Bus, TimeSlot};
pub use change_log::{ChangeAction, ChangeLogEntry};
pub use route::{Block, BlockStudent, Route, RouteContext, RouteKey, RouteSlot};
pub use student::{EligibleStudent, Student, TransportEvent, WeeklySchedule};
pub use types::{Direction, ScheduleMode, TransportMode};
