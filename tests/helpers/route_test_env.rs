// ==========================================
// 线路编排测试环境
// ==========================================
// 职责: 临时数据库 + 全部仓储 + 可注入故障的网关 + 事件接收端
// ==========================================

#[path = "../test_helpers.rs"]
mod test_helpers;

use std::error::Error;
use std::sync::Arc;

use bus_route_planner::config::RoutingConfig;
use bus_route_planner::domain::bus::Bus;
use bus_route_planner::domain::route::{Block, RouteContext};
use bus_route_planner::domain::student::WeeklySchedule;
use bus_route_planner::domain::types::{Direction, ScheduleMode};
use bus_route_planner::engine::eligibility::EligibilityResolver;
use bus_route_planner::engine::events::{ChannelEventPublisher, RouteEvent, RouteEventType};
use bus_route_planner::engine::repositories::RouteRepositories;
use bus_route_planner::engine::session::RouteSession;
use bus_route_planner::engine::EngineResult;
use bus_route_planner::repository::{StudentRepository, TimeSlotRepository};
use chrono::Weekday;
use tempfile::NamedTempFile;
use tokio::sync::mpsc::Receiver;

use super::mock_gateway::FailingGateway;
use super::test_data_builder::{pickup_slot, StudentBuilder, CAMPUS, SEMESTER, SLOT_ID};

pub const WEEKDAY: Weekday = Weekday::Mon;

pub struct RouteTestEnv {
    pub db_path: String,
    pub repositories: RouteRepositories,
    pub student_repo: Arc<StudentRepository>,
    pub time_slot_repo: Arc<TimeSlotRepository>,
    pub gateway: Arc<FailingGateway>,
    pub publisher: ChannelEventPublisher,
    events: Receiver<RouteEvent>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl RouteTestEnv {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let (temp_file, db_path) = test_helpers::create_test_db()?;
        let conn = test_helpers::open_shared_connection(&db_path)?;

        let repositories = RouteRepositories::from_connection(conn.clone());
        let student_repo = Arc::new(StudentRepository::new(conn.clone()));
        let time_slot_repo = Arc::new(TimeSlotRepository::new(conn));
        let gateway = Arc::new(FailingGateway::new(Arc::new(repositories.clone())));
        let (publisher, events) = ChannelEventPublisher::new();

        let env = Self {
            db_path,
            repositories,
            student_repo,
            time_slot_repo,
            gateway,
            publisher,
            events,
            _temp_file: temp_file,
        };
        env.time_slot_repo.upsert(&pickup_slot())?;
        Ok(env)
    }

    // ==========================================
    // 数据准备
    // ==========================================

    pub fn seed_buses(&self, buses: &[Bus]) -> Result<(), Box<dyn Error>> {
        for bus in buses {
            self.repositories.bus_repo.upsert(bus)?;
        }
        Ok(())
    }

    /// 学员主数据 (不排课)
    pub fn seed_students<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), Box<dyn Error>> {
        for id in ids {
            self.student_repo.upsert(&StudentBuilder::new(id.as_ref()).build())?;
        }
        Ok(())
    }

    /// 学员主数据 + 常规时段课表
    pub fn seed_regular_riders<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), Box<dyn Error>> {
        self.seed_students(ids)?;
        for id in ids {
            self.student_repo.insert_schedule(&WeeklySchedule {
                student_id: id.as_ref().to_string(),
                weekday: WEEKDAY,
                time_slot_id: SLOT_ID.to_string(),
            })?;
        }
        Ok(())
    }

    /// 直接落库一条线路的线路块, 返回线路ID
    pub fn seed_route(&self, bus_id: &str, blocks: Vec<Block>) -> Result<String, Box<dyn Error>> {
        let key = regular_context()
            .route_key(bus_id)
            .ok_or("常规上下文缺少时段")?;
        let ids = self.repositories.route_repo.save_layout(&[(key, blocks)])?;
        ids.into_iter().next().ok_or_else(|| "save_layout 未返回线路ID".into())
    }

    // ==========================================
    // 会话
    // ==========================================

    pub async fn open_session(&self, context: RouteContext) -> EngineResult<RouteSession> {
        self.open_session_with(context, RoutingConfig::default()).await
    }

    pub async fn open_session_with(
        &self,
        context: RouteContext,
        config: RoutingConfig,
    ) -> EngineResult<RouteSession> {
        RouteSession::open(
            self.gateway.clone(),
            EligibilityResolver::new(self.student_repo.clone()),
            config,
            Arc::new(self.publisher.clone()),
            context,
        )
        .await
    }

    // ==========================================
    // 事件与存储查询
    // ==========================================

    /// 取出目前为止收到的全部事件
    pub fn drain_events(&mut self) -> Vec<RouteEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn drain_event_types(&mut self) -> Vec<RouteEventType> {
        self.drain_events().into_iter().map(|e| e.event_type).collect()
    }

    /// 存储中的线路块 (按 order_index 排序)
    pub fn stored_blocks(&self, route_id: &str) -> Vec<Block> {
        self.repositories
            .route_repo
            .load_blocks(route_id)
            .expect("load_blocks 失败")
    }

    pub fn stored_block(&self, route_id: &str, block_id: &str) -> Option<Block> {
        self.stored_blocks(route_id)
            .into_iter()
            .find(|b| b.block_id == block_id)
    }

    pub fn log_count(&self, route_id: &str) -> u64 {
        self.repositories
            .change_log_repo
            .count_by_route(route_id)
            .expect("count_by_route 失败")
    }
}

pub fn regular_context() -> RouteContext {
    RouteContext::regular(SEMESTER, CAMPUS, Direction::Pickup, WEEKDAY, SLOT_ID)
}

pub fn special_context() -> RouteContext {
    RouteContext::dated(
        SEMESTER,
        Some(CAMPUS.to_string()),
        Direction::Pickup,
        ScheduleMode::Special,
        super::test_data_builder::special_date(),
    )
}
