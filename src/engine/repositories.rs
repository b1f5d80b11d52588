// ==========================================
// 校车线路编排系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合线路编排所需的所有 Repository, 并实现 RouteGateway
// 目标: 引擎只面向 RouteGateway, 不直接依赖 SQLite
// ==========================================

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::domain::bus::Bus;
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::route::{Block, RouteKey};
use crate::engine::gateway::RouteGateway;
use crate::repository::{
    AssignmentProcedureParams, AssignmentProcedureRepository, AssignmentProcedureSummary,
    BusRepository, ChangeLogRepository, RepositoryResult, RouteRepository,
};

/// 线路编排仓储集合
///
/// # 包含的仓储
/// - `bus_repo`: 车辆目录
/// - `route_repo`: 线路/线路块/成员
/// - `procedure_repo`: 常规排班自动编排过程
/// - `change_log_repo`: 变更日志
#[derive(Clone)]
pub struct RouteRepositories {
    /// 车辆仓储
    pub bus_repo: Arc<BusRepository>,
    /// 线路仓储
    pub route_repo: Arc<RouteRepository>,
    /// 自动编排过程
    pub procedure_repo: Arc<AssignmentProcedureRepository>,
    /// 变更日志仓储
    pub change_log_repo: Arc<ChangeLogRepository>,
}

impl RouteRepositories {
    /// 创建新的仓储集合
    pub fn new(
        bus_repo: Arc<BusRepository>,
        route_repo: Arc<RouteRepository>,
        procedure_repo: Arc<AssignmentProcedureRepository>,
        change_log_repo: Arc<ChangeLogRepository>,
    ) -> Self {
        Self {
            bus_repo,
            route_repo,
            procedure_repo,
            change_log_repo,
        }
    }

    /// 基于同一共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self::new(
            Arc::new(BusRepository::new(conn.clone())),
            Arc::new(RouteRepository::new(conn.clone())),
            Arc::new(AssignmentProcedureRepository::new(conn.clone())),
            Arc::new(ChangeLogRepository::new(conn)),
        )
    }
}

#[async_trait]
impl RouteGateway for RouteRepositories {
    async fn list_active_buses(&self, campus: Option<&str>) -> RepositoryResult<Vec<Bus>> {
        self.bus_repo.find_active(campus)
    }

    async fn find_route_id(&self, key: &RouteKey) -> RepositoryResult<Option<String>> {
        self.route_repo.find_route_id(key)
    }

    async fn load_blocks(&self, route_id: &str) -> RepositoryResult<Vec<Block>> {
        self.route_repo.load_blocks(route_id)
    }

    async fn move_membership(
        &self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> RepositoryResult<()> {
        self.route_repo.move_membership(student_id, from_block_id, to_block_id)
    }

    async fn update_block_route(&self, block_id: &str, route_id: &str) -> RepositoryResult<()> {
        self.route_repo.update_block_route(block_id, route_id)
    }

    async fn update_block_placement(
        &self,
        block_id: &str,
        route_id: Option<&str>,
        order_index: i32,
    ) -> RepositoryResult<()> {
        self.route_repo.update_block_placement(block_id, route_id, order_index)
    }

    async fn delete_blocks(&self, block_ids: &[String]) -> RepositoryResult<usize> {
        self.route_repo.delete_blocks(block_ids)
    }

    async fn confirm_route(&self, route_id: &str, estimated_minutes: u32) -> RepositoryResult<()> {
        self.route_repo.confirm_route(route_id, estimated_minutes)
    }

    async fn save_layout(&self, layout: &[(RouteKey, Vec<Block>)]) -> RepositoryResult<Vec<String>> {
        self.route_repo.save_layout(layout)
    }

    async fn run_assignment_procedure(
        &self,
        params: &AssignmentProcedureParams,
    ) -> RepositoryResult<AssignmentProcedureSummary> {
        self.procedure_repo.execute(params)
    }

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> RepositoryResult<()> {
        self.change_log_repo.append(entry).map(|_| ())
    }
}
