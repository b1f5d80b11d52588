// ==========================================
// 校车线路编排系统 - 常规排班自动编排过程 (存储侧)
// ==========================================
// 说明: 常规排班的分组算法归数据存储所有, 调用方只传参数、看结果.
// 这里在 SQLite 上实现该过程, 保证确定性:
//   1. 取资格学员 (与常规资格查询一致)
//   2. 取校区启用车辆 (按名称排序), 无车辆直接失败
//   3. 清空这些车辆在该上下文下的原有线路块
//   4. 学员按固定人数切块, 依次装车; 当前车装不下整块时换下一辆,
//      最后一辆车承接剩余全部
// 红线: 整个过程单事务, 失败不留半成品
// ==========================================

use crate::domain::route::{Block, BlockStudent, RouteKey, RouteSlot};
use crate::domain::types::Direction;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::route_repo::{clear_route_blocks_in, ensure_route_in, insert_block_in};
use crate::repository::student_repo::query_regular_eligible;
use chrono::Weekday;
use rusqlite::{params, Connection, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 过程参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProcedureParams {
    pub semester: String,
    pub campus: String,
    pub direction: Direction,
    pub time_slot_id: String,
    pub weekday: Weekday,
    pub chunk_size: usize,
    pub per_student_minutes: f64,
    pub min_block_minutes: u32,
}

/// 过程执行摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentProcedureSummary {
    pub route_count: usize,
    pub block_count: usize,
    pub student_count: usize,
}

pub struct AssignmentProcedureRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentProcedureRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 执行自动编排过程
    pub fn execute(&self, p: &AssignmentProcedureParams) -> RepositoryResult<AssignmentProcedureSummary> {
        if p.chunk_size == 0 {
            return Err(RepositoryError::field("chunk_size", "必须大于 0"));
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let students = query_regular_eligible(&tx, &p.campus, p.weekday, &p.time_slot_id, p.direction)?;

        let buses: Vec<(String, u32)> = {
            let mut stmt = tx.prepare(
                "SELECT bus_id, capacity FROM bus WHERE is_active = 1 AND campus = ?1 ORDER BY bus_name, bus_id",
            )?;
            let rows = stmt
                .query_map(params![p.campus], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };
        if buses.is_empty() {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "校区 {} 没有启用车辆",
                p.campus
            )));
        }

        let mut route_ids = Vec::with_capacity(buses.len());
        for (bus_id, _) in &buses {
            let key = RouteKey {
                bus_id: bus_id.clone(),
                direction: p.direction,
                slot: RouteSlot::TimeSlot(p.time_slot_id.clone()),
                weekday: p.weekday,
                semester: p.semester.clone(),
            };
            let route_id = ensure_route_in(&tx, &key)?;
            clear_route_blocks_in(&tx, &route_id)?;
            route_ids.push(route_id);
        }

        let mut loads = vec![0usize; buses.len()];
        let mut block_counts = vec![0i32; buses.len()];
        let mut bus_idx = 0usize;
        let mut summary = AssignmentProcedureSummary {
            route_count: buses.len(),
            ..Default::default()
        };

        for chunk in students.chunks(p.chunk_size) {
            while bus_idx + 1 < buses.len() && loads[bus_idx] + chunk.len() > buses[bus_idx].1 as usize {
                bus_idx += 1;
            }

            block_counts[bus_idx] += 1;
            let block = Block {
                block_id: uuid::Uuid::new_v4().to_string(),
                route_id: Some(route_ids[bus_idx].clone()),
                label: format!("{}/{}#{}", p.campus, p.direction.short_label(), block_counts[bus_idx]),
                order_index: block_counts[bus_idx],
                extra_minutes: block_minutes(chunk.len(), p.per_student_minutes, p.min_block_minutes),
                students: chunk
                    .iter()
                    .map(|s| BlockStudent {
                        student_id: s.student_id.clone(),
                        student_name: s.student_name.clone(),
                        class_name: s.class_name.clone(),
                        campus: s.campus.clone(),
                        event_time: None,
                    })
                    .collect(),
            };
            insert_block_in(&tx, &route_ids[bus_idx], &block)?;

            loads[bus_idx] += chunk.len();
            summary.block_count += 1;
            summary.student_count += chunk.len();
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(summary)
    }
}

/// 线路块附加时长 = max(最小值, round(人数 × 每人分钟))
pub fn block_minutes(student_count: usize, per_student_minutes: f64, min_block_minutes: u32) -> u32 {
    let raw = (student_count as f64 * per_student_minutes).round();
    let raw = if raw.is_finite() && raw > 0.0 { raw as u32 } else { 0 };
    raw.max(min_block_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::route_repo::RouteRepository;

    fn setup(bus_caps: &[(&str, u32)], students: usize) -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO time_slot (slot_id, label, base_time, campus, direction) VALUES ('TS1', 'AM', '08:00', 'EAST', 'PICKUP')",
            [],
        )
        .unwrap();
        for (id, cap) in bus_caps {
            conn.execute(
                "INSERT INTO bus (bus_id, bus_name, capacity, campus) VALUES (?1, ?1, ?2, 'EAST')",
                params![id, cap],
            )
            .unwrap();
        }
        for i in 0..students {
            let sid = format!("S{:02}", i);
            conn.execute(
                "INSERT INTO student (student_id, student_name, class_name, campus) VALUES (?1, ?1, 'A', 'EAST')",
                params![sid],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO student_schedule (student_id, weekday, time_slot_id) VALUES (?1, 'Mon', 'TS1')",
                params![sid],
            )
            .unwrap();
        }
        Arc::new(Mutex::new(conn))
    }

    fn params_for() -> AssignmentProcedureParams {
        AssignmentProcedureParams {
            semester: "2026-S2".to_string(),
            campus: "EAST".to_string(),
            direction: Direction::Pickup,
            time_slot_id: "TS1".to_string(),
            weekday: Weekday::Mon,
            chunk_size: 5,
            per_student_minutes: 2.0,
            min_block_minutes: 2,
        }
    }

    #[test]
    fn test_block_minutes_floor() {
        assert_eq!(block_minutes(0, 2.0, 2), 2);
        assert_eq!(block_minutes(1, 2.0, 2), 2);
        assert_eq!(block_minutes(3, 2.0, 2), 6);
        assert_eq!(block_minutes(5, 2.0, 2), 10);
        assert_eq!(block_minutes(3, 1.5, 2), 5); // 4.5 四舍五入
    }

    #[test]
    fn test_fills_buses_by_capacity() {
        let conn = setup(&[("B1", 10), ("B2", 10)], 13);
        let proc_repo = AssignmentProcedureRepository::new(conn.clone());
        let summary = proc_repo.execute(&params_for()).unwrap();
        assert_eq!(summary, AssignmentProcedureSummary { route_count: 2, block_count: 3, student_count: 13 });

        let routes = RouteRepository::new(conn);
        let key = |bus: &str| RouteKey {
            bus_id: bus.to_string(),
            direction: Direction::Pickup,
            slot: RouteSlot::TimeSlot("TS1".to_string()),
            weekday: Weekday::Mon,
            semester: "2026-S2".to_string(),
        };
        let b1 = routes.load_blocks(&routes.find_route_id(&key("B1")).unwrap().unwrap()).unwrap();
        let b2 = routes.load_blocks(&routes.find_route_id(&key("B2")).unwrap().unwrap()).unwrap();
        assert_eq!(b1.iter().map(|b| b.student_count()).sum::<usize>(), 10);
        assert_eq!(b2.iter().map(|b| b.student_count()).sum::<usize>(), 3);
    }

    #[test]
    fn test_rerun_replaces_previous_blocks() {
        let conn = setup(&[("B1", 30)], 7);
        let proc_repo = AssignmentProcedureRepository::new(conn);
        proc_repo.execute(&params_for()).unwrap();
        let again = proc_repo.execute(&params_for()).unwrap();
        assert_eq!(again.block_count, 2);
        assert_eq!(again.student_count, 7);
    }

    #[test]
    fn test_no_buses_fails_without_changes() {
        let conn = setup(&[], 3);
        let proc_repo = AssignmentProcedureRepository::new(conn);
        let err = proc_repo.execute(&params_for()).unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));
    }
}
