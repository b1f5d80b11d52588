// ==========================================
// 校车线路编排系统 - API 层
// ==========================================
// 职责: 提供看板业务接口, 供界面层调用
// ==========================================

pub mod dto;
pub mod error;
pub mod route_api;

// 重导出核心类型
pub use dto::{BlockView, BusLoadView, RouteBoardView};
pub use error::{ApiError, ApiResult};
pub use route_api::RouteApi;
