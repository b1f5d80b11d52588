// ==========================================
// 校车线路编排系统 - 线路存储网关 (引擎侧接口)
// ==========================================
// 职责: 定义引擎需要的全部远端读写, 引擎只依赖此 trait
// 实现者: RouteRepositories (SQLite), 测试中的内存实现
// 红线: 每个写操作要么完整成功, 要么返回错误且不留部分结果
// ==========================================

use crate::domain::bus::Bus;
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::route::{Block, RouteKey};
use crate::repository::{AssignmentProcedureParams, AssignmentProcedureSummary, RepositoryResult};
use async_trait::async_trait;

#[async_trait]
pub trait RouteGateway: Send + Sync {
    /// 启用车辆目录 (campus 为 None 表示全部校区)
    async fn list_active_buses(&self, campus: Option<&str>) -> RepositoryResult<Vec<Bus>>;

    /// 按复合键查找线路ID
    async fn find_route_id(&self, key: &RouteKey) -> RepositoryResult<Option<String>>;

    /// 加载线路下的线路块 (含学员)
    async fn load_blocks(&self, route_id: &str) -> RepositoryResult<Vec<Block>>;

    /// 学员换线路块
    async fn move_membership(
        &self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> RepositoryResult<()>;

    /// 线路块换归属线路
    async fn update_block_route(&self, block_id: &str, route_id: &str) -> RepositoryResult<()>;

    /// 线路块顺序 (可选同时更新归属线路)
    async fn update_block_placement(
        &self,
        block_id: &str,
        route_id: Option<&str>,
        order_index: i32,
    ) -> RepositoryResult<()>;

    /// 批量删除线路块
    async fn delete_blocks(&self, block_ids: &[String]) -> RepositoryResult<usize>;

    /// 确认线路
    async fn confirm_route(&self, route_id: &str, estimated_minutes: u32) -> RepositoryResult<()>;

    /// 整体保存布局, 返回与输入顺序一致的线路ID
    async fn save_layout(&self, layout: &[(RouteKey, Vec<Block>)]) -> RepositoryResult<Vec<String>>;

    /// 常规排班的存储侧自动编排过程
    async fn run_assignment_procedure(
        &self,
        params: &AssignmentProcedureParams,
    ) -> RepositoryResult<AssignmentProcedureSummary>;

    /// 追加变更日志
    async fn append_change_log(&self, entry: &ChangeLogEntry) -> RepositoryResult<()>;
}
