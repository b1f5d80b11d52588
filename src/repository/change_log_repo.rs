// ==========================================
// 校车线路编排系统 - 线路变更日志数据仓储
// ==========================================
// 对齐: route_change_log 表
// 红线: 只追加, 不提供更新/删除接口
// ==========================================

mod core;
mod queries;


pub use core::ChangeLogRepository;
