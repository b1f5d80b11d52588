use super::*;
use crate::engine::route_store::StagedChange;
use serde_json::json;

/// 单次变更结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub action: ChangeAction,
    pub route_id: Option<String>,
    /// 是否写入了存储 (草稿布局为 false)
    pub persisted: bool,
    /// 变更日志是否写入成功
    pub audit_recorded: bool,
    pub effect: MutationEffect,
}

impl RouteSession {
    // ==========================================
    // 拖拽调整
    // ==========================================

    /// 学员换线路块 (可跨车)
    ///
    /// # 流程
    /// 1. 快照副本上校验 (线路块/学员不存在直接失败, 不写存储)
    /// 2. 存储中删除原成员并插入新成员
    /// 3. 追加 move_student 日志
    /// 4. 提交快照, 重算, 两端车辆标记脏
    #[instrument(skip(self))]
    pub async fn move_student(
        &mut self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> EngineResult<MutationOutcome> {
        let result = self
            .move_student_inner(student_id, from_block_id, to_block_id)
            .await;
        self.report("move_student", result)
    }

    async fn move_student_inner(
        &mut self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> EngineResult<MutationOutcome> {
        let staged = self.store.stage(&SnapshotMutation::MoveStudent {
            student_id: student_id.to_string(),
            from_block_id: from_block_id.to_string(),
            to_block_id: to_block_id.to_string(),
        })?;
        if !self.store.is_persisted() {
            return Ok(self.finish(ChangeAction::MoveStudent, None, false, false, staged));
        }

        self.gateway
            .move_membership(student_id, from_block_id, to_block_id)
            .await?;

        let from_bus = staged.effect.from_bus.clone().unwrap_or_default();
        let to_bus = staged.effect.to_bus.clone().unwrap_or_default();
        let route_id = self.owning_route(&to_bus, self.store.block(to_block_id));
        let payload = json!({
            "student_id": student_id,
            "from_block_id": from_block_id,
            "to_block_id": to_block_id,
            "from_bus_id": from_bus,
            "to_bus_id": to_bus,
        });
        let audit_recorded = match &route_id {
            Some(id) => self.record_change(id, ChangeAction::MoveStudent, &payload).await,
            None => false,
        };

        Ok(self.finish(ChangeAction::MoveStudent, route_id, true, audit_recorded, staged))
    }

    /// 线路块换车 (追加到目标车末尾)
    ///
    /// 目标车在本上下文中没有线路时返回 RouteNotFound
    #[instrument(skip(self))]
    pub async fn move_block(&mut self, block_id: &str, to_bus_id: &str) -> EngineResult<MutationOutcome> {
        let result = self.move_block_inner(block_id, to_bus_id).await;
        self.report("move_block", result)
    }

    async fn move_block_inner(&mut self, block_id: &str, to_bus_id: &str) -> EngineResult<MutationOutcome> {
        let from_bus = self.locate_block(block_id)?;
        if !self.store.contains_bus(to_bus_id) {
            return Err(EngineError::UnknownBus(to_bus_id.to_string()));
        }
        if from_bus == to_bus_id {
            return Err(EngineError::InvalidMove(format!(
                "线路块 {} 已在车辆 {} 上",
                block_id, to_bus_id
            )));
        }

        if !self.store.is_persisted() {
            let staged = self.store.stage(&SnapshotMutation::MoveBlock {
                block_id: block_id.to_string(),
                to_bus_id: to_bus_id.to_string(),
                to_route_id: None,
            })?;
            return Ok(self.finish(ChangeAction::MoveBlockBus, None, false, false, staged));
        }

        let to_route_id = self
            .lookup_route_id(to_bus_id)
            .await?
            .ok_or_else(|| EngineError::RouteNotFound {
                bus_id: to_bus_id.to_string(),
            })?;
        let from_route_id = self.owning_route(&from_bus, self.store.block(block_id));
        let staged = self.store.stage(&SnapshotMutation::MoveBlock {
            block_id: block_id.to_string(),
            to_bus_id: to_bus_id.to_string(),
            to_route_id: Some(to_route_id.clone()),
        })?;

        self.gateway.update_block_route(block_id, &to_route_id).await?;

        let payload = json!({
            "block_id": block_id,
            "from_bus_id": from_bus,
            "to_bus_id": to_bus_id,
            "from_route_id": from_route_id,
        });
        let audit_recorded = self
            .record_change(&to_route_id, ChangeAction::MoveBlockBus, &payload)
            .await;

        Ok(self.finish(ChangeAction::MoveBlockBus, Some(to_route_id), true, audit_recorded, staged))
    }

    /// 线路块插入到目标块之前 (可跨车)
    ///
    /// 只持久化被移动块的顺序 = 插入位置 + 1, 同线路其它块不重排.
    /// 跨车时同一次写入更新归属线路, 目标车没有线路时返回 RouteNotFound.
    #[instrument(skip(self))]
    pub async fn reorder_block(
        &mut self,
        block_id: &str,
        to_bus_id: &str,
        before_block_id: Option<&str>,
    ) -> EngineResult<MutationOutcome> {
        let result = self
            .reorder_block_inner(block_id, to_bus_id, before_block_id)
            .await;
        self.report("reorder_block", result)
    }

    async fn reorder_block_inner(
        &mut self,
        block_id: &str,
        to_bus_id: &str,
        before_block_id: Option<&str>,
    ) -> EngineResult<MutationOutcome> {
        let from_bus = self.locate_block(block_id)?;
        if !self.store.contains_bus(to_bus_id) {
            return Err(EngineError::UnknownBus(to_bus_id.to_string()));
        }
        let persisted = self.store.is_persisted();
        let to_route_id = if persisted && from_bus != to_bus_id {
            let id = self
                .lookup_route_id(to_bus_id)
                .await?
                .ok_or_else(|| EngineError::RouteNotFound {
                    bus_id: to_bus_id.to_string(),
                })?;
            Some(id)
        } else {
            None
        };
        let route_id = to_route_id
            .clone()
            .or_else(|| self.owning_route(&from_bus, self.store.block(block_id)));

        let staged = self.store.stage(&SnapshotMutation::ReorderBlock {
            block_id: block_id.to_string(),
            to_bus_id: to_bus_id.to_string(),
            before_block_id: before_block_id.map(str::to_string),
            to_route_id: to_route_id.clone(),
        })?;
        if !persisted {
            return Ok(self.finish(ChangeAction::ReorderBlock, None, false, false, staged));
        }

        let order_index = staged.effect.insert_position.unwrap_or(0) as i32 + 1;
        self.gateway
            .update_block_placement(block_id, to_route_id.as_deref(), order_index)
            .await?;

        let payload = json!({
            "block_id": block_id,
            "from_bus_id": from_bus,
            "to_bus_id": to_bus_id,
            "before_block_id": before_block_id,
            "order_index": order_index,
        });
        let audit_recorded = match &route_id {
            Some(id) => self.record_change(id, ChangeAction::ReorderBlock, &payload).await,
            None => false,
        };

        Ok(self.finish(ChangeAction::ReorderBlock, route_id, true, audit_recorded, staged))
    }

    fn locate_block(&self, block_id: &str) -> EngineResult<String> {
        self.store
            .find_block(block_id)
            .map(|(bus_id, _)| bus_id.to_string())
            .ok_or_else(|| EngineError::BlockNotFound(block_id.to_string()))
    }

    /// 提交快照, 标记脏, 重算并通知
    pub(super) fn finish(
        &mut self,
        action: ChangeAction,
        route_id: Option<String>,
        persisted: bool,
        audit_recorded: bool,
        staged: StagedChange,
    ) -> MutationOutcome {
        let effect = self.store.commit(staged);
        self.store.mark_dirty(effect.touched_buses.iter().cloned());
        self.recompute();

        tracing::info!(
            action = action.as_str(),
            persisted,
            audit_recorded,
            students = self.aggregates.total_students,
            "变更已生效"
        );
        self.notify(RouteEvent::new(
            RouteEventType::MutationApplied,
            action.as_str(),
            effect.touched_buses.iter().cloned().collect(),
        ));
        self.publish_alerts(action.as_str());

        MutationOutcome {
            action,
            route_id,
            persisted,
            audit_recorded,
            effect,
        }
    }
}
