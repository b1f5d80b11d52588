// ==========================================
// 校车线路编排系统 - 看板快照 (RouteStore)
// ==========================================
// 职责: 持有一个编排上下文下全部车辆的线路块快照
// 结构: 车辆ID -> 有序线路块列表, 另记线路ID与每车脏标记
// 用法: stage 在副本上校验并生成新快照, 远端写成功后 commit;
//       草稿布局无远端写, 直接 apply
// 红线: 同一上下文中一个学员最多出现在一个线路块中
// 红线: stage 失败时快照保持原样
// ==========================================

use crate::domain::route::{Block, RouteContext};
use crate::engine::error::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ==========================================
// SnapshotMutation - 快照变更
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotMutation {
    /// 学员换线路块 (可跨车)
    MoveStudent {
        student_id: String,
        from_block_id: String,
        to_block_id: String,
    },
    /// 线路块换车, 追加到目标车末尾
    MoveBlock {
        block_id: String,
        to_bus_id: String,
        to_route_id: Option<String>,
    },
    /// 线路块插入到目标块之前; 目标块不存在时插到首位
    ReorderBlock {
        block_id: String,
        to_bus_id: String,
        before_block_id: Option<String>,
        to_route_id: Option<String>,
    },
    /// 用存储中的最新数据替换单车线路块
    ReplaceBus {
        bus_id: String,
        route_id: Option<String>,
        blocks: Vec<Block>,
    },
    /// 整体替换看板 (草稿布局)
    ReplaceAll { buses: BTreeMap<String, Vec<Block>> },
    /// 移除所有空线路块
    RemoveEmptyBlocks,
}

/// 变更影响
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationEffect {
    pub from_bus: Option<String>,
    pub to_bus: Option<String>,
    /// 线路块在目标车中的插入位置 (从 0 开始)
    pub insert_position: Option<usize>,
    /// (车辆ID, 线路块ID)
    pub removed_blocks: Vec<(String, String)>,
    /// 其它车辆上被替换数据挤掉的旧成员数
    pub evicted_students: usize,
    pub touched_buses: BTreeSet<String>,
}

/// 已校验、待提交的变更
#[derive(Debug, Clone)]
pub struct StagedChange {
    next: RouteStore,
    pub effect: MutationEffect,
}

impl StagedChange {
    pub fn preview(&self) -> &RouteStore {
        &self.next
    }
}

// ==========================================
// RouteStore
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStore {
    context: RouteContext,
    buses: BTreeMap<String, Vec<Block>>,
    route_ids: BTreeMap<String, String>,
    dirty: BTreeSet<String>,
    persisted: bool,
}

impl RouteStore {
    /// 从存储加载的快照
    pub fn loaded(
        context: RouteContext,
        buses: BTreeMap<String, Vec<Block>>,
        route_ids: BTreeMap<String, String>,
    ) -> EngineResult<Self> {
        validate_unique(&buses)?;
        Ok(Self {
            context,
            buses,
            route_ids,
            dirty: BTreeSet::new(),
            persisted: true,
        })
    }

    pub fn context(&self) -> &RouteContext {
        &self.context
    }

    pub fn buses(&self) -> &BTreeMap<String, Vec<Block>> {
        &self.buses
    }

    pub fn blocks(&self, bus_id: &str) -> &[Block] {
        self.buses.get(bus_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_bus(&self, bus_id: &str) -> bool {
        self.buses.contains_key(bus_id)
    }

    pub fn route_id(&self, bus_id: &str) -> Option<&str> {
        self.route_ids.get(bus_id).map(String::as_str)
    }

    /// 布局是否已落库 (自动编排草稿为 false)
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_dirty(&self, bus_id: &str) -> bool {
        self.dirty.contains(bus_id)
    }

    pub fn any_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_buses(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    pub fn mark_dirty<I, S>(&mut self, bus_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for bus_id in bus_ids {
            self.dirty.insert(bus_id.into());
        }
    }

    pub fn clear_dirty(&mut self, bus_id: &str) {
        self.dirty.remove(bus_id);
    }

    /// 草稿落库后记录线路ID; 线路块归属与顺序 (按位置 1..n) 同步更新
    pub fn mark_persisted(&mut self, route_ids: BTreeMap<String, String>) {
        for (bus_id, route_id) in &route_ids {
            if let Some(blocks) = self.buses.get_mut(bus_id) {
                for (idx, block) in blocks.iter_mut().enumerate() {
                    block.route_id = Some(route_id.clone());
                    block.order_index = idx as i32 + 1;
                }
            }
        }
        self.route_ids.extend(route_ids);
        self.persisted = true;
    }

    /// 查找线路块: (车辆ID, 下标)
    pub fn find_block(&self, block_id: &str) -> Option<(&str, usize)> {
        self.buses.iter().find_map(|(bus_id, blocks)| {
            blocks
                .iter()
                .position(|b| b.block_id == block_id)
                .map(|idx| (bus_id.as_str(), idx))
        })
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.find_block(block_id)
            .and_then(|(bus_id, idx)| self.buses.get(bus_id).and_then(|blocks| blocks.get(idx)))
    }

    /// 查找学员所在: (车辆ID, 线路块ID)
    pub fn find_student(&self, student_id: &str) -> Option<(&str, &str)> {
        self.buses.iter().find_map(|(bus_id, blocks)| {
            blocks
                .iter()
                .find(|b| b.contains_student(student_id))
                .map(|b| (bus_id.as_str(), b.block_id.as_str()))
        })
    }

    pub fn total_students(&self) -> usize {
        self.buses
            .values()
            .flat_map(|blocks| blocks.iter())
            .map(Block::student_count)
            .sum()
    }

    // ==========================================
    // stage / commit / apply
    // ==========================================

    /// 在副本上执行变更并校验, 不修改当前快照
    pub fn stage(&self, mutation: &SnapshotMutation) -> EngineResult<StagedChange> {
        let mut next = self.clone();
        let mut effect = MutationEffect::default();

        match mutation {
            SnapshotMutation::MoveStudent {
                student_id,
                from_block_id,
                to_block_id,
            } => {
                if from_block_id == to_block_id {
                    return Err(EngineError::InvalidMove(format!(
                        "学员 {} 已在线路块 {} 中",
                        student_id, to_block_id
                    )));
                }
                let (from_bus, from_idx) = locate(&next, from_block_id)?;
                let (to_bus, to_idx) = locate(&next, to_block_id)?;

                let source = block_mut(&mut next, &from_bus, from_idx)?;
                let pos = source
                    .students
                    .iter()
                    .position(|s| &s.student_id == student_id)
                    .ok_or_else(|| EngineError::StudentNotInBlock {
                        student_id: student_id.clone(),
                        block_id: from_block_id.clone(),
                    })?;
                let student = source.students.remove(pos);
                block_mut(&mut next, &to_bus, to_idx)?.students.push(student);

                effect.touched_buses.insert(from_bus.clone());
                effect.touched_buses.insert(to_bus.clone());
                effect.from_bus = Some(from_bus);
                effect.to_bus = Some(to_bus);
            }

            SnapshotMutation::MoveBlock {
                block_id,
                to_bus_id,
                to_route_id,
            } => {
                let (from_bus, from_idx) = locate(&next, block_id)?;
                if !next.buses.contains_key(to_bus_id) {
                    return Err(EngineError::UnknownBus(to_bus_id.clone()));
                }
                if &from_bus == to_bus_id {
                    return Err(EngineError::InvalidMove(format!(
                        "线路块 {} 已在车辆 {} 上",
                        block_id, to_bus_id
                    )));
                }

                let mut block = remove_block(&mut next, &from_bus, from_idx)?;
                if to_route_id.is_some() {
                    block.route_id = to_route_id.clone();
                }
                let target = next.buses.entry(to_bus_id.clone()).or_default();
                target.push(block);

                effect.insert_position = Some(target.len() - 1);
                effect.touched_buses.insert(from_bus.clone());
                effect.touched_buses.insert(to_bus_id.clone());
                effect.from_bus = Some(from_bus);
                effect.to_bus = Some(to_bus_id.clone());
            }

            SnapshotMutation::ReorderBlock {
                block_id,
                to_bus_id,
                before_block_id,
                to_route_id,
            } => {
                let (from_bus, from_idx) = locate(&next, block_id)?;
                if !next.buses.contains_key(to_bus_id) {
                    return Err(EngineError::UnknownBus(to_bus_id.clone()));
                }

                let mut block = remove_block(&mut next, &from_bus, from_idx)?;
                let target = next.buses.entry(to_bus_id.clone()).or_default();
                let position = before_block_id
                    .as_ref()
                    .and_then(|before| target.iter().position(|b| &b.block_id == before))
                    .unwrap_or(0);

                block.order_index = position as i32 + 1;
                if &from_bus != to_bus_id && to_route_id.is_some() {
                    block.route_id = to_route_id.clone();
                }
                target.insert(position, block);

                effect.insert_position = Some(position);
                effect.touched_buses.insert(from_bus.clone());
                effect.touched_buses.insert(to_bus_id.clone());
                effect.from_bus = Some(from_bus);
                effect.to_bus = Some(to_bus_id.clone());
            }

            SnapshotMutation::ReplaceBus {
                bus_id,
                route_id,
                blocks,
            } => {
                // 存储数据为准: 其它车辆快照中的同名线路块和学员视为过期
                let incoming_blocks: HashSet<&str> =
                    blocks.iter().map(|b| b.block_id.as_str()).collect();
                let incoming: HashSet<&str> = blocks
                    .iter()
                    .flat_map(|b| b.students.iter())
                    .map(|s| s.student_id.as_str())
                    .collect();
                for (other_bus, other_blocks) in next.buses.iter_mut() {
                    if other_bus == bus_id {
                        continue;
                    }
                    let before = other_blocks.len();
                    other_blocks.retain(|b| {
                        if incoming_blocks.contains(b.block_id.as_str()) {
                            effect
                                .removed_blocks
                                .push((other_bus.clone(), b.block_id.clone()));
                            false
                        } else {
                            true
                        }
                    });
                    if other_blocks.len() != before {
                        effect.touched_buses.insert(other_bus.clone());
                    }
                    for block in other_blocks.iter_mut() {
                        let before = block.students.len();
                        block
                            .students
                            .retain(|s| !incoming.contains(s.student_id.as_str()));
                        let evicted = before - block.students.len();
                        if evicted > 0 {
                            effect.evicted_students += evicted;
                            effect.touched_buses.insert(other_bus.clone());
                        }
                    }
                }

                let previous = next.buses.insert(bus_id.clone(), blocks.clone());
                if previous.as_ref() != Some(blocks) {
                    effect.touched_buses.insert(bus_id.clone());
                }
                match route_id {
                    Some(id) => {
                        next.route_ids.insert(bus_id.clone(), id.clone());
                    }
                    None => {
                        next.route_ids.remove(bus_id);
                    }
                }
                effect.to_bus = Some(bus_id.clone());
            }

            SnapshotMutation::ReplaceAll { buses } => {
                let bus_ids: BTreeSet<&String> = next.buses.keys().chain(buses.keys()).collect();
                for bus_id in bus_ids {
                    if next.buses.get(bus_id) != buses.get(bus_id) {
                        effect.touched_buses.insert(bus_id.clone());
                    }
                }
                next.buses = buses.clone();
                next.persisted = false;
            }

            SnapshotMutation::RemoveEmptyBlocks => {
                for (bus_id, blocks) in next.buses.iter_mut() {
                    blocks.retain(|b| {
                        if b.is_empty() {
                            effect.removed_blocks.push((bus_id.clone(), b.block_id.clone()));
                            false
                        } else {
                            true
                        }
                    });
                }
                effect.touched_buses = effect.removed_blocks.iter().map(|(bus, _)| bus.clone()).collect();
            }
        }

        validate_unique(&next.buses)?;
        Ok(StagedChange { next, effect })
    }

    /// 提交已校验的变更
    pub fn commit(&mut self, staged: StagedChange) -> MutationEffect {
        *self = staged.next;
        staged.effect
    }

    /// stage + commit (无远端写的本地变更)
    pub fn apply(&mut self, mutation: &SnapshotMutation) -> EngineResult<MutationEffect> {
        let staged = self.stage(mutation)?;
        Ok(self.commit(staged))
    }
}

fn locate(store: &RouteStore, block_id: &str) -> EngineResult<(String, usize)> {
    store
        .find_block(block_id)
        .map(|(bus_id, idx)| (bus_id.to_string(), idx))
        .ok_or_else(|| EngineError::BlockNotFound(block_id.to_string()))
}

fn block_mut<'a>(store: &'a mut RouteStore, bus_id: &str, idx: usize) -> EngineResult<&'a mut Block> {
    store
        .buses
        .get_mut(bus_id)
        .and_then(|blocks| blocks.get_mut(idx))
        .ok_or_else(|| EngineError::UnknownBus(bus_id.to_string()))
}

fn remove_block(store: &mut RouteStore, bus_id: &str, idx: usize) -> EngineResult<Block> {
    match store.buses.get_mut(bus_id) {
        Some(blocks) if idx < blocks.len() => Ok(blocks.remove(idx)),
        _ => Err(EngineError::UnknownBus(bus_id.to_string())),
    }
}

/// 同一上下文中学员不得重复
fn validate_unique(buses: &BTreeMap<String, Vec<Block>>) -> EngineResult<()> {
    let mut blocks = HashSet::new();
    let mut students = HashSet::new();
    for block in buses.values().flatten() {
        if !blocks.insert(block.block_id.as_str()) {
            return Err(EngineError::DuplicateBlock(block.block_id.clone()));
        }
        for student in &block.students {
            if !students.insert(student.student_id.as_str()) {
                return Err(EngineError::DuplicateStudent(student.student_id.clone()));
            }
        }
    }
    Ok(())
}
