// ==========================================
// 校车线路编排系统 - 引擎层
// ==========================================
// 职责: 资格判定、自动编排、拖拽变更、载客计算、线路确认
// 红线: Engine 不拼 SQL, 只通过 RouteGateway / EligibilitySource 访问数据
// ==========================================

pub mod assignment;
pub mod capacity;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod gateway;
pub mod repositories;
pub mod route_store;
pub mod session;

// 重导出核心引擎
pub use assignment::{
    AssignmentOutcome, AssignmentRequest, AssignmentStrategy, BusRing, LocalChunkStrategy,
    ServerProcedureStrategy,
};
pub use capacity::{BusLoad, CapacityCalculator, RouteAggregates};
pub use eligibility::{EligibilityResolver, EligibilitySource};
pub use error::{EngineError, EngineResult, FailureKind};
pub use events::{
    ChannelEventPublisher, NoOpEventPublisher, RouteEvent, RouteEventPublisher, RouteEventType,
};
pub use gateway::RouteGateway;
pub use repositories::RouteRepositories;
pub use route_store::{MutationEffect, RouteStore, SnapshotMutation, StagedChange};
pub use session::{
    load_routing_config, ConfirmOutcome, MutationOutcome, RouteSession, SaveOutcome,
};
