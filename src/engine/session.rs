// ==========================================
// 校车线路编排系统 - 线路编排会话
// ==========================================
// 职责: 一个看板 (编排上下文) 的完整工作流
//   加载 -> 选车 -> 资格判定 -> 自动编排 -> 拖拽调整 -> 保存 -> 确认
// 红线: 先写存储, 成功后再提交本地快照; 写失败本地不变
// 红线: 每次变更后整体重算载客与时长
// 红线: 失败既返回错误, 也通过事件发布通知调用方
// ==========================================

mod confirmation;
mod layout;
mod mutation;

pub use confirmation::ConfirmOutcome;
pub use layout::SaveOutcome;
pub use mutation::MutationOutcome;

use crate::config::{RoutingConfig, RoutingConfigReader};
use crate::domain::bus::Bus;
use crate::domain::change_log::{ChangeAction, ChangeLogEntry};
use crate::domain::route::{Block, RouteContext};
use crate::domain::student::EligibleStudent;
use crate::engine::assignment::{
    AssignmentOutcome, AssignmentRequest, AssignmentStrategy, LocalChunkStrategy,
    ServerProcedureStrategy,
};
use crate::engine::capacity::{CapacityCalculator, RouteAggregates};
use crate::engine::eligibility::EligibilityResolver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{RouteEvent, RouteEventPublisher, RouteEventType};
use crate::engine::gateway::RouteGateway;
use crate::engine::route_store::{MutationEffect, RouteStore, SnapshotMutation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// 读取编排配置 (配置错误归为 Configuration 类)
pub async fn load_routing_config(reader: &dyn RoutingConfigReader) -> EngineResult<RoutingConfig> {
    reader
        .load_routing_config()
        .await
        .map_err(|e| EngineError::Config(e.to_string()))
}

// ==========================================
// RouteSession
// ==========================================
pub struct RouteSession {
    gateway: Arc<dyn RouteGateway>,
    resolver: EligibilityResolver,
    strategy: Arc<dyn AssignmentStrategy>,
    config: RoutingConfig,
    publisher: Arc<dyn RouteEventPublisher>,
    catalog: Vec<Bus>,
    selected_bus: Option<String>,
    store: RouteStore,
    aggregates: RouteAggregates,
    eligible: Vec<EligibleStudent>,
}

impl RouteSession {
    /// 打开看板: 加载车辆目录与每辆车在本上下文中的线路块
    ///
    /// 常规排班使用存储侧编排过程, 特别日/假期使用本地切块
    #[instrument(skip_all, fields(semester = %context.semester, direction = %context.direction))]
    pub async fn open(
        gateway: Arc<dyn RouteGateway>,
        resolver: EligibilityResolver,
        config: RoutingConfig,
        publisher: Arc<dyn RouteEventPublisher>,
        context: RouteContext,
    ) -> EngineResult<Self> {
        let strategy: Arc<dyn AssignmentStrategy> = if context.schedule_mode.is_date_scoped() {
            Arc::new(LocalChunkStrategy::new())
        } else {
            Arc::new(ServerProcedureStrategy::new(gateway.clone()))
        };

        match Self::load(&gateway, &context).await {
            Ok((catalog, store)) => {
                let mut session = Self {
                    gateway,
                    resolver,
                    strategy,
                    config,
                    publisher,
                    catalog,
                    selected_bus: None,
                    store,
                    aggregates: RouteAggregates::default(),
                    eligible: Vec::new(),
                };
                session.recompute();
                tracing::info!(
                    buses = session.catalog.len(),
                    students = session.aggregates.total_students,
                    "看板已加载"
                );
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "看板加载失败");
                if let Err(e) = publisher.publish(RouteEvent::failed("open", &err)) {
                    tracing::warn!("事件发布失败: {}", e);
                }
                Err(err)
            }
        }
    }

    async fn load(
        gateway: &Arc<dyn RouteGateway>,
        context: &RouteContext,
    ) -> EngineResult<(Vec<Bus>, RouteStore)> {
        let campus = context.campus.as_deref().filter(|c| !c.trim().is_empty());
        let catalog = gateway.list_active_buses(campus).await?;

        let mut buses = BTreeMap::new();
        let mut route_ids = BTreeMap::new();
        for bus in &catalog {
            let blocks = match context.route_key(&bus.bus_id) {
                Some(key) => match gateway.find_route_id(&key).await? {
                    Some(route_id) => {
                        let blocks = gateway.load_blocks(&route_id).await?;
                        route_ids.insert(bus.bus_id.clone(), route_id);
                        blocks
                    }
                    None => Vec::new(),
                },
                None => Vec::new(),
            };
            buses.insert(bus.bus_id.clone(), blocks);
        }

        let store = RouteStore::loaded(context.clone(), buses, route_ids)?;
        Ok((catalog, store))
    }

    /// 替换自动编排策略
    pub fn with_strategy(mut self, strategy: Arc<dyn AssignmentStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    // ==========================================
    // 只读访问
    // ==========================================

    pub fn context(&self) -> &RouteContext {
        self.store.context()
    }

    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    pub fn aggregates(&self) -> &RouteAggregates {
        &self.aggregates
    }

    pub fn catalog(&self) -> &[Bus] {
        &self.catalog
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn eligible(&self) -> &[EligibleStudent] {
        &self.eligible
    }

    pub fn selected_bus(&self) -> Option<&str> {
        self.selected_bus.as_deref()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    // ==========================================
    // 选车 / 重新加载
    // ==========================================

    pub fn select_bus(&mut self, bus_id: &str) -> EngineResult<()> {
        let result = if self.store.contains_bus(bus_id) {
            self.selected_bus = Some(bus_id.to_string());
            Ok(())
        } else {
            Err(EngineError::UnknownBus(bus_id.to_string()))
        };
        self.report("select_bus", result)
    }

    /// 从存储重新加载单车线路块
    #[instrument(skip(self))]
    pub async fn reload_bus(&mut self, bus_id: &str) -> EngineResult<MutationEffect> {
        let result = self.reload_bus_inner(bus_id).await;
        self.report("reload_bus", result)
    }

    async fn reload_bus_inner(&mut self, bus_id: &str) -> EngineResult<MutationEffect> {
        if !self.store.contains_bus(bus_id) {
            return Err(EngineError::UnknownBus(bus_id.to_string()));
        }
        let key = self
            .context()
            .route_key(bus_id)
            .ok_or_else(|| EngineError::IncompleteContext("缺少时段或日期".to_string()))?;

        let route_id = self.gateway.find_route_id(&key).await?;
        let blocks = match &route_id {
            Some(id) => self.gateway.load_blocks(id).await?,
            None => Vec::new(),
        };

        let effect = self.store.apply(&SnapshotMutation::ReplaceBus {
            bus_id: bus_id.to_string(),
            route_id,
            blocks,
        })?;
        if effect.evicted_students > 0 {
            tracing::debug!(bus_id, evicted = effect.evicted_students, "其它车辆的过期成员已移除");
        }
        self.recompute();
        Ok(effect)
    }

    // ==========================================
    // 资格判定 / 自动编排
    // ==========================================

    pub async fn resolve_eligibility(&mut self) -> EngineResult<&[EligibleStudent]> {
        let result = self.resolver.resolve(self.store.context()).await;
        match self.report("resolve_eligibility", result) {
            Ok(students) => {
                self.eligible = students;
                Ok(&self.eligible)
            }
            Err(err) => Err(err),
        }
    }

    /// 自动编排
    ///
    /// - 资格列表为空: 不改变任何状态
    /// - 常规排班: 存储侧完成后只重新加载当前选中车辆 (未选车时加载全部), 并标记脏
    /// - 特别日/假期: 整体替换看板为草稿布局, 需 save_layout 后才落库
    #[instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub async fn auto_assign(&mut self) -> EngineResult<AssignmentOutcome> {
        let result = self.auto_assign_inner().await;
        self.report("auto_assign", result)
    }

    async fn auto_assign_inner(&mut self) -> EngineResult<AssignmentOutcome> {
        self.eligible = self.resolver.resolve(self.store.context()).await?;

        let outcome = {
            let request = AssignmentRequest {
                context: self.store.context(),
                students: &self.eligible,
                buses: &self.catalog,
                config: &self.config,
            };
            self.strategy.assign(&request).await?
        };

        match &outcome {
            AssignmentOutcome::Unchanged => {
                tracing::info!("没有需要乘车的学员, 看板保持不变");
                return Ok(outcome);
            }
            AssignmentOutcome::Replaced { buses, student_count } => {
                let effect = self.store.apply(&SnapshotMutation::ReplaceAll { buses: buses.clone() })?;
                self.store.mark_dirty(effect.touched_buses.iter().cloned());
                self.recompute();
                tracing::info!(students = student_count, "草稿布局已生成");
            }
            AssignmentOutcome::Delegated { .. } => {
                let targets: Vec<String> = match &self.selected_bus {
                    Some(bus_id) => vec![bus_id.clone()],
                    None => self.store.buses().keys().cloned().collect(),
                };
                for bus_id in &targets {
                    self.reload_bus_inner(bus_id).await?;
                }
                self.store.mark_dirty(targets.iter().cloned());
            }
        }

        let bus_ids = self.store.dirty_buses();
        self.notify(RouteEvent::new(RouteEventType::LayoutReplaced, "auto_assign", bus_ids));
        self.publish_alerts("auto_assign");
        Ok(outcome)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 整体重算载客与时长
    fn recompute(&mut self) {
        let calculator = CapacityCalculator::new(&self.config, self.store.context().direction);
        self.aggregates = calculator.compute(self.store.buses(), &self.catalog);
    }

    /// 记录失败并通知调用方
    fn report<T>(&self, operation: &str, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            tracing::warn!(operation, kind = ?err.kind(), error = %err, "操作失败");
            self.notify(RouteEvent::failed(operation, err));
        }
        result
    }

    fn notify(&self, event: RouteEvent) {
        if let Err(e) = self.publisher.publish(event) {
            tracing::warn!("事件发布失败: {}", e);
        }
    }

    /// 超载/超时告警
    fn publish_alerts(&self, operation: &str) {
        if self.aggregates.any_capacity_exceeded {
            let buses = self.aggregates.over_capacity_buses();
            let detail: Vec<String> = buses
                .iter()
                .filter_map(|id| self.aggregates.load(id))
                .map(|l| format!("{} {}/{}", l.bus_id, l.occupancy, l.capacity.unwrap_or(0)))
                .collect();
            self.notify(
                RouteEvent::new(RouteEventType::CapacityWarning, operation, buses)
                    .with_message(format!("载客超限: {}", detail.join(", "))),
            );
        }
        if self.aggregates.any_time_exceeded {
            let buses = self.aggregates.over_time_buses();
            let detail: Vec<String> = buses
                .iter()
                .filter_map(|id| self.aggregates.load(id))
                .map(|l| format!("{} {}分钟", l.bus_id, l.estimated_minutes))
                .collect();
            self.notify(
                RouteEvent::new(RouteEventType::TimeWarning, operation, buses).with_message(format!(
                    "线路超时 (上限 {} 分钟): {}",
                    self.config.max_route_minutes,
                    detail.join(", ")
                )),
            );
        }
    }

    /// 追加变更日志; 失败只告警, 返回是否写入
    async fn record_change<P: Serialize + Sync>(
        &self,
        route_id: &str,
        action: ChangeAction,
        payload: &P,
    ) -> bool {
        let entry = ChangeLogEntry::new(route_id, action, payload);
        match self.gateway.append_change_log(&entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(route_id, action = action.as_str(), error = %e, "变更日志写入失败");
                false
            }
        }
    }

    /// 线路块当前归属的线路ID
    fn owning_route(&self, bus_id: &str, block: Option<&Block>) -> Option<String> {
        block
            .and_then(|b| b.route_id.clone())
            .or_else(|| self.store.route_id(bus_id).map(str::to_string))
    }

    /// 目标车在本上下文中的线路ID (快照中没有时查存储)
    async fn lookup_route_id(&self, bus_id: &str) -> EngineResult<Option<String>> {
        if let Some(id) = self.store.route_id(bus_id) {
            return Ok(Some(id.to_string()));
        }
        match self.context().route_key(bus_id) {
            Some(key) => Ok(self.gateway.find_route_id(&key).await?),
            None => Ok(None),
        }
    }
}
