use super::*;
use serde_json::json;

/// 线路确认结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmOutcome {
    pub bus_id: String,
    pub route_id: String,
    pub estimated_minutes: u32,
    pub audit_recorded: bool,
}

impl RouteSession {
    // ==========================================
    // 线路确认
    // ==========================================

    /// 确认当前选中车辆的线路
    ///
    /// # 前置条件
    /// - 已选车, 且该车有未确认的变更
    /// - 看板中没有任何车辆超载
    /// - 布局已落库
    #[instrument(skip(self))]
    pub async fn confirm_selected(&mut self) -> EngineResult<ConfirmOutcome> {
        let result = self.confirm_selected_inner().await;
        self.report("confirm", result)
    }

    async fn confirm_selected_inner(&mut self) -> EngineResult<ConfirmOutcome> {
        let bus_id = self.selected_bus.clone().ok_or(EngineError::NoBusSelected)?;
        if !self.store.is_dirty(&bus_id) {
            return Err(EngineError::NothingToConfirm);
        }
        self.ensure_confirmable()?;

        let route_id = self.confirm_route_id(&bus_id).await?;
        self.confirm_one(&bus_id, route_id).await
    }

    /// 一次确认所有有变更的车辆
    ///
    /// 先解析全部线路ID, 任一缺失则不做任何确认
    #[instrument(skip(self))]
    pub async fn confirm_all(&mut self) -> EngineResult<Vec<ConfirmOutcome>> {
        let result = self.confirm_all_inner().await;
        self.report("confirm_all", result)
    }

    async fn confirm_all_inner(&mut self) -> EngineResult<Vec<ConfirmOutcome>> {
        let dirty = self.store.dirty_buses();
        if dirty.is_empty() {
            return Err(EngineError::NothingToConfirm);
        }
        self.ensure_confirmable()?;

        let mut targets = Vec::with_capacity(dirty.len());
        for bus_id in dirty {
            let route_id = self.confirm_route_id(&bus_id).await?;
            targets.push((bus_id, route_id));
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for (bus_id, route_id) in targets {
            outcomes.push(self.confirm_one(&bus_id, route_id).await?);
        }
        Ok(outcomes)
    }

    fn ensure_confirmable(&self) -> EngineResult<()> {
        if self.aggregates.any_capacity_exceeded {
            return Err(EngineError::CapacityExceeded {
                buses: self.aggregates.over_capacity_buses(),
            });
        }
        if !self.store.is_persisted() {
            return Err(EngineError::LayoutNotSaved);
        }
        Ok(())
    }

    async fn confirm_route_id(&self, bus_id: &str) -> EngineResult<String> {
        self.lookup_route_id(bus_id)
            .await?
            .ok_or_else(|| EngineError::RouteNotFound {
                bus_id: bus_id.to_string(),
            })
    }

    async fn confirm_one(&mut self, bus_id: &str, route_id: String) -> EngineResult<ConfirmOutcome> {
        let estimated_minutes = self
            .aggregates
            .load(bus_id)
            .map(|l| l.estimated_minutes)
            .unwrap_or_else(|| self.config.base_minutes(self.context().direction));

        self.gateway.confirm_route(&route_id, estimated_minutes).await?;

        let payload = json!({
            "bus_id": bus_id,
            "estimated_minutes": estimated_minutes,
            "occupancy": self.aggregates.load(bus_id).map_or(0, |l| l.occupancy),
        });
        let audit_recorded = self
            .record_change(&route_id, ChangeAction::ConfirmRoute, &payload)
            .await;

        self.store.clear_dirty(bus_id);
        tracing::info!(bus_id, route_id = %route_id, estimated_minutes, "线路已确认");
        self.notify(RouteEvent::new(
            RouteEventType::RouteConfirmed,
            "confirm",
            vec![bus_id.to_string()],
        ));

        Ok(ConfirmOutcome {
            bus_id: bus_id.to_string(),
            route_id,
            estimated_minutes,
            audit_recorded,
        })
    }
}
