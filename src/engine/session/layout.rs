use super::*;
use serde_json::json;

/// 草稿布局保存结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// 车辆ID -> 线路ID
    pub route_ids: BTreeMap<String, String>,
    pub block_count: usize,
    pub student_count: usize,
    pub audit_recorded: bool,
}

impl RouteSession {
    // ==========================================
    // 草稿布局落库
    // ==========================================

    /// 保存自动编排生成的草稿布局
    ///
    /// 看板中每辆车: 确保线路存在, 用快照替换其线路块与成员, 顺序按位置重写为 1..n.
    /// 保存后脏标记保留, 等待确认.
    #[instrument(skip(self))]
    pub async fn save_layout(&mut self) -> EngineResult<SaveOutcome> {
        let result = self.save_layout_inner().await;
        self.report("save_layout", result)
    }

    async fn save_layout_inner(&mut self) -> EngineResult<SaveOutcome> {
        if self.store.is_persisted() {
            return Err(EngineError::AlreadySaved);
        }

        let mut layout = Vec::with_capacity(self.store.buses().len());
        for (bus_id, blocks) in self.store.buses() {
            let key = self
                .context()
                .route_key(bus_id)
                .ok_or_else(|| EngineError::IncompleteContext("缺少时段或日期".to_string()))?;
            let blocks: Vec<Block> = blocks
                .iter()
                .enumerate()
                .map(|(idx, block)| Block {
                    order_index: idx as i32 + 1,
                    ..block.clone()
                })
                .collect();
            layout.push((key, blocks));
        }

        let saved_ids = self.gateway.save_layout(&layout).await?;

        let mut route_ids = BTreeMap::new();
        let mut audit_recorded = true;
        let mut block_count = 0;
        let mut student_count = 0;
        for ((key, blocks), route_id) in layout.iter().zip(saved_ids) {
            let students: usize = blocks.iter().map(Block::student_count).sum();
            let payload = json!({
                "bus_id": key.bus_id,
                "block_ids": blocks.iter().map(|b| b.block_id.as_str()).collect::<Vec<_>>(),
                "student_count": students,
            });
            audit_recorded &= self
                .record_change(&route_id, ChangeAction::SaveLayout, &payload)
                .await;
            block_count += blocks.len();
            student_count += students;
            route_ids.insert(key.bus_id.clone(), route_id);
        }

        self.store.mark_persisted(route_ids.clone());
        tracing::info!(routes = route_ids.len(), block_count, student_count, "草稿布局已保存");
        self.notify(RouteEvent::new(
            RouteEventType::LayoutSaved,
            "save_layout",
            route_ids.keys().cloned().collect(),
        ));

        Ok(SaveOutcome {
            route_ids,
            block_count,
            student_count,
            audit_recorded,
        })
    }

    // ==========================================
    // 空线路块清理
    // ==========================================

    /// 移除所有空线路块 (学员全部移走后保留的占位块)
    ///
    /// 没有空线路块时不做任何改动, 返回 removed_blocks 为空的结果
    #[instrument(skip(self))]
    pub async fn sweep_empty_blocks(&mut self) -> EngineResult<MutationOutcome> {
        let result = self.sweep_empty_blocks_inner().await;
        self.report("sweep_empty_blocks", result)
    }

    async fn sweep_empty_blocks_inner(&mut self) -> EngineResult<MutationOutcome> {
        let staged = self.store.stage(&SnapshotMutation::RemoveEmptyBlocks)?;
        let persisted = self.store.is_persisted();
        if staged.effect.removed_blocks.is_empty() {
            return Ok(MutationOutcome {
                action: ChangeAction::SweepEmptyBlocks,
                route_id: None,
                persisted,
                audit_recorded: false,
                effect: staged.effect,
            });
        }
        if !persisted {
            return Ok(self.finish(ChangeAction::SweepEmptyBlocks, None, false, false, staged));
        }

        // 线路ID -> 被删除的线路块
        let mut by_route: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (bus_id, block_id) in &staged.effect.removed_blocks {
            if let Some(route_id) = self.owning_route(bus_id, self.store.block(block_id)) {
                by_route.entry(route_id).or_default().push(block_id.clone());
            }
        }
        let block_ids: Vec<String> = staged
            .effect
            .removed_blocks
            .iter()
            .map(|(_, block_id)| block_id.clone())
            .collect();

        let deleted = self.gateway.delete_blocks(&block_ids).await?;
        tracing::debug!(deleted, "空线路块已删除");

        let mut audit_recorded = true;
        for (route_id, blocks) in &by_route {
            let payload = json!({ "block_ids": blocks });
            audit_recorded &= self
                .record_change(route_id, ChangeAction::SweepEmptyBlocks, &payload)
                .await;
        }

        Ok(self.finish(ChangeAction::SweepEmptyBlocks, None, true, audit_recorded, staged))
    }
}
