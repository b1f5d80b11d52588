// ==========================================
// 校车线路编排系统 - 自动编排策略
// ==========================================
// 职责: 生成初始线路块/车辆布局
// 策略:
//   - ServerProcedureStrategy: 常规排班, 委托存储侧编排过程
//   - LocalChunkStrategy: 特别日/假期, 本地按 (校区, 时间) 分组切块并轮转装车
// 红线: 资格列表为空时不改变任何状态
// 红线: 车辆列表为空时直接失败, 不做取模
// ==========================================

use crate::config::RoutingConfig;
use crate::domain::bus::Bus;
use crate::domain::route::{Block, BlockStudent, RouteContext};
use crate::domain::student::EligibleStudent;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::gateway::RouteGateway;
use crate::repository::assignment_procedure_repo::block_minutes;
use crate::repository::{AssignmentProcedureParams, AssignmentProcedureSummary};
use async_trait::async_trait;
use chrono::NaiveTime;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 编排请求
pub struct AssignmentRequest<'a> {
    pub context: &'a RouteContext,
    pub students: &'a [EligibleStudent],
    pub buses: &'a [Bus],
    pub config: &'a RoutingConfig,
}

/// 编排结果
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    /// 无资格学员, 未做任何改动
    Unchanged,
    /// 本地生成的草稿布局 (需整体替换看板)
    Replaced {
        buses: BTreeMap<String, Vec<Block>>,
        student_count: usize,
    },
    /// 已由存储侧完成编排 (需重新加载)
    Delegated { summary: AssignmentProcedureSummary },
}

#[async_trait]
pub trait AssignmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn assign(&self, request: &AssignmentRequest<'_>) -> EngineResult<AssignmentOutcome>;
}

// ==========================================
// BusRing - 轮转分车
// ==========================================
#[derive(Debug, Clone)]
pub struct BusRing {
    bus_ids: Vec<String>,
    cursor: usize,
}

impl BusRing {
    pub fn new(buses: &[Bus]) -> EngineResult<Self> {
        if buses.is_empty() {
            return Err(EngineError::NoActiveBuses);
        }
        Ok(Self {
            bus_ids: buses.iter().map(|b| b.bus_id.clone()).collect(),
            cursor: 0,
        })
    }

    /// 下一辆车 (到末尾后回到第一辆)
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> &str {
        let idx = self.cursor % self.bus_ids.len();
        self.cursor += 1;
        &self.bus_ids[idx]
    }

    /// 已分配次数
    pub fn issued(&self) -> usize {
        self.cursor
    }
}

// ==========================================
// ServerProcedureStrategy - 常规排班
// ==========================================
pub struct ServerProcedureStrategy {
    gateway: Arc<dyn RouteGateway>,
}

impl ServerProcedureStrategy {
    pub fn new(gateway: Arc<dyn RouteGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl AssignmentStrategy for ServerProcedureStrategy {
    fn name(&self) -> &'static str {
        "server_procedure"
    }

    async fn assign(&self, request: &AssignmentRequest<'_>) -> EngineResult<AssignmentOutcome> {
        if request.students.is_empty() {
            return Ok(AssignmentOutcome::Unchanged);
        }

        let ctx = request.context;
        let campus = ctx
            .campus
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| EngineError::IncompleteContext("常规排班需要校区".to_string()))?;
        let time_slot_id = ctx
            .time_slot_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| EngineError::IncompleteContext("常规排班需要时段".to_string()))?;

        let params = AssignmentProcedureParams {
            semester: ctx.semester.clone(),
            campus,
            direction: ctx.direction,
            time_slot_id,
            weekday: ctx.weekday,
            chunk_size: request.config.block_chunk_size,
            per_student_minutes: request.config.per_student_minutes,
            min_block_minutes: request.config.min_block_minutes,
        };

        let summary = self
            .gateway
            .run_assignment_procedure(&params)
            .await
            .map_err(|e| EngineError::Procedure(e.to_string()))?;

        tracing::info!(
            routes = summary.route_count,
            blocks = summary.block_count,
            students = summary.student_count,
            "存储侧自动编排完成"
        );
        Ok(AssignmentOutcome::Delegated { summary })
    }
}

// ==========================================
// LocalChunkStrategy - 特别日/假期
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LocalChunkStrategy;

impl LocalChunkStrategy {
    pub fn new() -> Self {
        Self
    }

    /// 生成布局: 分组 -> 切块 -> 轮转装车
    pub fn layout(&self, request: &AssignmentRequest<'_>) -> EngineResult<AssignmentOutcome> {
        if request.students.is_empty() {
            return Ok(AssignmentOutcome::Unchanged);
        }
        let mut ring = BusRing::new(request.buses)?;
        let config = request.config;
        let chunk_size = config.block_chunk_size.max(1);
        let direction = request.context.direction.short_label();

        // (时间, 校区) 排序, 组内保持资格列表顺序
        let mut groups: BTreeMap<(Option<NaiveTime>, &str), Vec<&EligibleStudent>> = BTreeMap::new();
        for student in request.students {
            groups
                .entry((student.event_time, student.campus.as_str()))
                .or_default()
                .push(student);
        }

        let mut buses: BTreeMap<String, Vec<Block>> = request
            .buses
            .iter()
            .map(|b| (b.bus_id.clone(), Vec::new()))
            .collect();

        for ((time, campus), members) in &groups {
            let time_label = time.map_or_else(|| "--:--".to_string(), |t| t.format("%H:%M").to_string());
            for (n, chunk) in members.chunks(chunk_size).enumerate() {
                let bus_blocks = buses.entry(ring.next().to_string()).or_default();
                let order_index = bus_blocks.len() as i32 + 1;
                bus_blocks.push(Block {
                    block_id: uuid::Uuid::new_v4().to_string(),
                    route_id: None,
                    label: format!("{}/{}/{}#{}", time_label, campus, direction, n + 1),
                    order_index,
                    extra_minutes: block_minutes(chunk.len(), config.per_student_minutes, config.min_block_minutes),
                    students: chunk.iter().map(|s| to_block_student(s)).collect(),
                });
            }
        }

        tracing::debug!(blocks = ring.issued(), groups = groups.len(), "本地切块完成");
        Ok(AssignmentOutcome::Replaced {
            buses,
            student_count: request.students.len(),
        })
    }
}

#[async_trait]
impl AssignmentStrategy for LocalChunkStrategy {
    fn name(&self) -> &'static str {
        "local_chunk"
    }

    async fn assign(&self, request: &AssignmentRequest<'_>) -> EngineResult<AssignmentOutcome> {
        self.layout(request)
    }
}

fn to_block_student(s: &EligibleStudent) -> BlockStudent {
    BlockStudent {
        student_id: s.student_id.clone(),
        student_name: s.student_name.clone(),
        class_name: s.class_name.clone(),
        campus: s.campus.clone(),
        event_time: s.event_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Direction, ScheduleMode};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn bus(id: &str) -> Bus {
        Bus {
            bus_id: id.to_string(),
            bus_name: id.to_string(),
            capacity: 12,
            campus: "EAST".to_string(),
            is_active: true,
        }
    }

    fn eligible(id: &str, campus: &str, time: (u32, u32)) -> EligibleStudent {
        EligibleStudent {
            student_id: id.to_string(),
            student_name: id.to_string(),
            class_name: "A".to_string(),
            campus: campus.to_string(),
            event_time: NaiveTime::from_hms_opt(time.0, time.1, 0),
        }
    }

    fn special_ctx() -> RouteContext {
        RouteContext::dated(
            "2026-S2",
            None,
            Direction::Pickup,
            ScheduleMode::Special,
            NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
        )
    }

    #[test]
    fn test_bus_ring_wraps_and_rejects_empty() {
        assert!(matches!(BusRing::new(&[]), Err(EngineError::NoActiveBuses)));

        let buses = [bus("B1"), bus("B2")];
        let mut ring = BusRing::new(&buses).unwrap();
        let picked: Vec<String> = (0..5).map(|_| ring.next().to_string()).collect();
        assert_eq!(picked, vec!["B1", "B2", "B1", "B2", "B1"]);
        assert_eq!(ring.issued(), 5);
    }

    #[test]
    fn test_twelve_students_over_six_buses() {
        let students: Vec<_> = (0..12).map(|i| eligible(&format!("S{:02}", i), "EAST", (9, 0))).collect();
        let buses: Vec<_> = (1..=6).map(|i| bus(&format!("B{}", i))).collect();
        let ctx = special_ctx();
        let config = RoutingConfig::default();
        let request = AssignmentRequest {
            context: &ctx,
            students: &students,
            buses: &buses,
            config: &config,
        };

        let AssignmentOutcome::Replaced { buses: layout, student_count } = LocalChunkStrategy::new().layout(&request).unwrap() else {
            panic!("expected a replaced layout");
        };
        assert_eq!(student_count, 12);
        assert_eq!(layout.len(), 6);

        let non_empty: Vec<_> = layout.iter().filter(|(_, blocks)| !blocks.is_empty()).collect();
        assert_eq!(non_empty.len(), 3);

        let sizes: Vec<usize> = ["B1", "B2", "B3"].iter().map(|b| layout[*b][0].student_count()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(layout["B1"][0].extra_minutes, 10);
        assert_eq!(layout["B3"][0].extra_minutes, 4);
        assert_eq!(layout["B1"][0].label, "09:00/EAST/pickup#1");

        let ids: HashSet<_> = layout
            .values()
            .flatten()
            .flat_map(|b| b.students.iter().map(|s| s.student_id.clone()))
            .collect();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_groups_by_time_then_campus() {
        let students = vec![
            eligible("S1", "WEST", (10, 0)),
            eligible("S2", "EAST", (10, 0)),
            eligible("S3", "EAST", (8, 30)),
        ];
        let buses = [bus("B1"), bus("B2"), bus("B3")];
        let ctx = special_ctx();
        let config = RoutingConfig::default();
        let request = AssignmentRequest {
            context: &ctx,
            students: &students,
            buses: &buses,
            config: &config,
        };

        let AssignmentOutcome::Replaced { buses: layout, .. } = LocalChunkStrategy::new().layout(&request).unwrap() else {
            panic!("expected a replaced layout");
        };
        assert_eq!(layout["B1"][0].label, "08:30/EAST/pickup#1");
        assert_eq!(layout["B2"][0].label, "10:00/EAST/pickup#1");
        assert_eq!(layout["B3"][0].label, "10:00/WEST/pickup#1");
        assert_eq!(layout["B1"][0].extra_minutes, 2);
    }

    #[test]
    fn test_empty_inputs() {
        let ctx = special_ctx();
        let config = RoutingConfig::default();
        let none = AssignmentRequest {
            context: &ctx,
            students: &[],
            buses: &[],
            config: &config,
        };
        assert_eq!(LocalChunkStrategy::new().layout(&none).unwrap(), AssignmentOutcome::Unchanged);

        let students = vec![eligible("S1", "EAST", (9, 0))];
        let no_buses = AssignmentRequest {
            context: &ctx,
            students: &students,
            buses: &[],
            config: &config,
        };
        assert!(matches!(LocalChunkStrategy::new().layout(&no_buses), Err(EngineError::NoActiveBuses)));
    }
}
