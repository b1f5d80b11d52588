// ==========================================
// 可注入故障的线路网关 - 用于集成测试
// ==========================================
// 包装真实 SQLite 网关, 按开关让写操作或日志追加失败,
// 用于验证 "写失败本地快照不变" 与 "日志失败只告警"
// ==========================================

use async_trait::async_trait;
use bus_route_planner::domain::bus::Bus;
use bus_route_planner::domain::change_log::ChangeLogEntry;
use bus_route_planner::domain::route::{Block, RouteKey};
use bus_route_planner::engine::gateway::RouteGateway;
use bus_route_planner::repository::{
    AssignmentProcedureParams, AssignmentProcedureSummary, RepositoryError, RepositoryResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub struct FailingGateway {
    inner: Arc<dyn RouteGateway>,
    fail_writes: AtomicBool,
    fail_audit: AtomicBool,
    write_calls: AtomicUsize,
}

impl FailingGateway {
    pub fn new(inner: Arc<dyn RouteGateway>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_audit: AtomicBool::new(false),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// 线路/线路块写操作失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 变更日志追加失败
    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// 已尝试的写操作次数 (含失败)
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check_write(&self, op: &str) -> RepositoryResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseTransactionError(format!("{} 注入失败", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl RouteGateway for FailingGateway {
    async fn list_active_buses(&self, campus: Option<&str>) -> RepositoryResult<Vec<Bus>> {
        self.inner.list_active_buses(campus).await
    }

    async fn find_route_id(&self, key: &RouteKey) -> RepositoryResult<Option<String>> {
        self.inner.find_route_id(key).await
    }

    async fn load_blocks(&self, route_id: &str) -> RepositoryResult<Vec<Block>> {
        self.inner.load_blocks(route_id).await
    }

    async fn move_membership(
        &self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> RepositoryResult<()> {
        self.check_write("move_membership")?;
        self.inner
            .move_membership(student_id, from_block_id, to_block_id)
            .await
    }

    async fn update_block_route(&self, block_id: &str, route_id: &str) -> RepositoryResult<()> {
        self.check_write("update_block_route")?;
        self.inner.update_block_route(block_id, route_id).await
    }

    async fn update_block_placement(
        &self,
        block_id: &str,
        route_id: Option<&str>,
        order_index: i32,
    ) -> RepositoryResult<()> {
        self.check_write("update_block_placement")?;
        self.inner
            .update_block_placement(block_id, route_id, order_index)
            .await
    }

    async fn delete_blocks(&self, block_ids: &[String]) -> RepositoryResult<usize> {
        self.check_write("delete_blocks")?;
        self.inner.delete_blocks(block_ids).await
    }

    async fn confirm_route(&self, route_id: &str, estimated_minutes: u32) -> RepositoryResult<()> {
        self.check_write("confirm_route")?;
        self.inner.confirm_route(route_id, estimated_minutes).await
    }

    async fn save_layout(&self, layout: &[(RouteKey, Vec<Block>)]) -> RepositoryResult<Vec<String>> {
        self.check_write("save_layout")?;
        self.inner.save_layout(layout).await
    }

    async fn run_assignment_procedure(
        &self,
        params: &AssignmentProcedureParams,
    ) -> RepositoryResult<AssignmentProcedureSummary> {
        self.check_write("run_assignment_procedure")?;
        self.inner.run_assignment_procedure(params).await
    }

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> RepositoryResult<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseQueryError("route_change_log 注入失败".to_string()));
        }
        self.inner.append_change_log(entry).await
    }
}
