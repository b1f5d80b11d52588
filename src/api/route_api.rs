// ==========================================
// 校车线路编排系统 - 线路看板 API
// ==========================================
// 职责: 看板打开、选车、自动编排、拖拽调整、保存、确认、日志查询
// 并发: 会话放在 tokio Mutex 中, 同一看板上的操作串行执行,
//       远端写等待期间的第二个操作会排队, 不会读到旧快照
// ==========================================

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::dto::RouteBoardView;
use crate::api::error::{ApiError, ApiResult};
use crate::config::RoutingConfigReader;
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::route::RouteContext;
use crate::domain::student::EligibleStudent;
use crate::engine::eligibility::EligibilityResolver;
use crate::engine::events::RouteEventPublisher;
use crate::engine::gateway::RouteGateway;
use crate::engine::session::{load_routing_config, ConfirmOutcome, RouteSession, SaveOutcome};
use crate::repository::ChangeLogRepository;

/// 日志查询上限
const MAX_LOG_LIMIT: u32 = 1000;

// ==========================================
// RouteApi - 线路看板 API
// ==========================================
pub struct RouteApi {
    gateway: Arc<dyn RouteGateway>,
    resolver: EligibilityResolver,
    config_reader: Arc<dyn RoutingConfigReader>,
    publisher: Arc<dyn RouteEventPublisher>,
    change_log_repo: Arc<ChangeLogRepository>,
    session: Mutex<Option<RouteSession>>,
}

impl RouteApi {
    pub fn new(
        gateway: Arc<dyn RouteGateway>,
        resolver: EligibilityResolver,
        config_reader: Arc<dyn RoutingConfigReader>,
        publisher: Arc<dyn RouteEventPublisher>,
        change_log_repo: Arc<ChangeLogRepository>,
    ) -> Self {
        Self {
            gateway,
            resolver,
            config_reader,
            publisher,
            change_log_repo,
            session: Mutex::new(None),
        }
    }

    // ==========================================
    // 看板
    // ==========================================

    /// 打开看板 (替换当前会话)
    ///
    /// # 参数
    /// - context: 学期/校区/方向/排班模式/星期/时段或日期
    pub async fn open_board(&self, context: RouteContext) -> ApiResult<RouteBoardView> {
        if context.semester.trim().is_empty() {
            return Err(ApiError::InvalidInput("学期不能为空".to_string()));
        }

        let config = load_routing_config(self.config_reader.as_ref()).await?;
        let session = RouteSession::open(
            self.gateway.clone(),
            self.resolver.clone(),
            config,
            self.publisher.clone(),
            context,
        )
        .await?;

        let view = RouteBoardView::from_session(&session);
        *self.session.lock().await = Some(session);
        Ok(view)
    }

    /// 当前看板
    pub async fn board(&self) -> ApiResult<RouteBoardView> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(ApiError::NoActiveBoard)?;
        Ok(RouteBoardView::from_session(session))
    }

    pub async fn select_bus(&self, bus_id: &str) -> ApiResult<RouteBoardView> {
        require_id("bus_id", bus_id)?;
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.select_bus(bus_id)?;
        Ok(RouteBoardView::from_session(session))
    }

    /// 资格学员列表
    ///
    /// 查询失败时已通过事件通知调用方, 这里返回空列表
    pub async fn resolve_eligibility(&self) -> ApiResult<Vec<EligibleStudent>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        match session.resolve_eligibility().await {
            Ok(students) => Ok(students.to_vec()),
            Err(e) => {
                tracing::warn!("资格判定失败, 返回空列表: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn auto_assign(&self) -> ApiResult<RouteBoardView> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.auto_assign().await?;
        Ok(RouteBoardView::from_session(session))
    }

    // ==========================================
    // 拖拽调整
    // ==========================================

    pub async fn move_student(
        &self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> ApiResult<RouteBoardView> {
        require_id("student_id", student_id)?;
        require_id("from_block_id", from_block_id)?;
        require_id("to_block_id", to_block_id)?;

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.move_student(student_id, from_block_id, to_block_id).await?;
        Ok(RouteBoardView::from_session(session))
    }

    pub async fn move_block(&self, block_id: &str, to_bus_id: &str) -> ApiResult<RouteBoardView> {
        require_id("block_id", block_id)?;
        require_id("to_bus_id", to_bus_id)?;

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.move_block(block_id, to_bus_id).await?;
        Ok(RouteBoardView::from_session(session))
    }

    /// before_block_id 为 None 时插到目标车首位
    pub async fn reorder_block(
        &self,
        block_id: &str,
        to_bus_id: &str,
        before_block_id: Option<&str>,
    ) -> ApiResult<RouteBoardView> {
        require_id("block_id", block_id)?;
        require_id("to_bus_id", to_bus_id)?;

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.reorder_block(block_id, to_bus_id, before_block_id).await?;
        Ok(RouteBoardView::from_session(session))
    }

    pub async fn sweep_empty_blocks(&self) -> ApiResult<RouteBoardView> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        session.sweep_empty_blocks().await?;
        Ok(RouteBoardView::from_session(session))
    }

    // ==========================================
    // 保存与确认
    // ==========================================

    pub async fn save_layout(&self) -> ApiResult<SaveOutcome> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        Ok(session.save_layout().await?)
    }

    /// 确认当前选中车辆
    pub async fn confirm(&self) -> ApiResult<ConfirmOutcome> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        Ok(session.confirm_selected().await?)
    }

    pub async fn confirm_all(&self) -> ApiResult<Vec<ConfirmOutcome>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ApiError::NoActiveBoard)?;
        Ok(session.confirm_all().await?)
    }

    // ==========================================
    // 变更日志
    // ==========================================

    /// 查询变更日志 (新的在前)
    ///
    /// route_id 为 None 时返回全部线路最近 limit 条
    pub fn list_change_logs(&self, route_id: Option<&str>, limit: u32) -> ApiResult<Vec<ChangeLogEntry>> {
        if limit == 0 || limit > MAX_LOG_LIMIT {
            return Err(ApiError::InvalidInput(format!(
                "limit必须在1-{}之间",
                MAX_LOG_LIMIT
            )));
        }

        let entries = match route_id {
            Some(id) => {
                require_id("route_id", id)?;
                let mut entries = self.change_log_repo.find_by_route(id)?;
                entries.truncate(limit as usize);
                entries
            }
            None => self.change_log_repo.find_recent(limit)?,
        };
        Ok(entries)
    }
}

fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}
