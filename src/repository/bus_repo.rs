// ==========================================
// 校车线路编排系统 - 车辆/时段目录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::bus::{Bus, TimeSlot};
use crate::domain::types::Direction;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// BusRepository - 车辆仓储
// ==========================================
pub struct BusRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BusRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖车辆
    pub fn upsert(&self, bus: &Bus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO bus (bus_id, bus_name, capacity, campus, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(bus_id) DO UPDATE SET
                bus_name = excluded.bus_name,
                capacity = excluded.capacity,
                campus = excluded.campus,
                is_active = excluded.is_active
            "#,
            params![bus.bus_id, bus.bus_name, bus.capacity, bus.campus, bus.is_active],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, bus_id: &str) -> RepositoryResult<Option<Bus>> {
        let conn = self.get_conn()?;
        let bus = conn
            .query_row(
                "SELECT bus_id, bus_name, capacity, campus, is_active FROM bus WHERE bus_id = ?1",
                params![bus_id],
                map_bus,
            )
            .optional()?;
        Ok(bus)
    }

    /// 查询启用车辆 (按名称排序)
    ///
    /// # 参数
    /// - campus: None 表示全部校区
    pub fn find_active(&self, campus: Option<&str>) -> RepositoryResult<Vec<Bus>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT bus_id, bus_name, capacity, campus, is_active
            FROM bus
            WHERE is_active = 1
              AND (?1 IS NULL OR campus = ?1)
            ORDER BY bus_name, bus_id
            "#,
        )?;
        let buses = stmt
            .query_map(params![campus], map_bus)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(buses)
    }
}

fn map_bus(row: &Row) -> SqliteResult<Bus> {
    Ok(Bus {
        bus_id: row.get(0)?,
        bus_name: row.get(1)?,
        capacity: row.get(2)?,
        campus: row.get(3)?,
        is_active: row.get(4)?,
    })
}

// ==========================================
// TimeSlotRepository - 接送时段仓储
// ==========================================
pub struct TimeSlotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeSlotRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert(&self, slot: &TimeSlot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO time_slot (slot_id, label, base_time, campus, direction, is_active, sort_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(slot_id) DO UPDATE SET
                label = excluded.label,
                base_time = excluded.base_time,
                campus = excluded.campus,
                direction = excluded.direction,
                is_active = excluded.is_active,
                sort_order = excluded.sort_order
            "#,
            params![
                slot.slot_id,
                slot.label,
                slot.base_time.format("%H:%M").to_string(),
                slot.campus,
                slot.direction.as_str(),
                slot.is_active,
                slot.sort_order,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, slot_id: &str) -> RepositoryResult<Option<TimeSlot>> {
        let conn = self.get_conn()?;
        let slot = conn
            .query_row(
                r#"
                SELECT slot_id, label, base_time, campus, direction, is_active, sort_order
                FROM time_slot WHERE slot_id = ?1
                "#,
                params![slot_id],
                map_time_slot,
            )
            .optional()?;
        Ok(slot)
    }

    /// 查询启用时段 (按 sort_order 排序)
    pub fn find_active(
        &self,
        campus: Option<&str>,
        direction: Option<Direction>,
    ) -> RepositoryResult<Vec<TimeSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT slot_id, label, base_time, campus, direction, is_active, sort_order
            FROM time_slot
            WHERE is_active = 1
              AND (?1 IS NULL OR campus = ?1)
              AND (?2 IS NULL OR direction = ?2)
            ORDER BY sort_order, base_time, slot_id
            "#,
        )?;
        let slots = stmt
            .query_map(params![campus, direction.map(|d| d.as_str())], map_time_slot)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(slots)
    }
}

fn map_time_slot(row: &Row) -> SqliteResult<TimeSlot> {
    let base_time_str: String = row.get(2)?;
    let direction_str: String = row.get(4)?;

    let base_time = NaiveTime::parse_from_str(&base_time_str, "%H:%M")
        .map_err(|e| conversion_error(2, format!("base_time 无效 {}: {}", base_time_str, e)))?;
    let direction = direction_str
        .parse::<Direction>()
        .map_err(|e| conversion_error(4, e))?;

    Ok(TimeSlot {
        slot_id: row.get(0)?,
        label: row.get(1)?,
        base_time,
        campus: row.get(3)?,
        direction,
        is_active: row.get(5)?,
        sort_order: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn bus(id: &str, name: &str, campus: &str, active: bool) -> Bus {
        Bus {
            bus_id: id.to_string(),
            bus_name: name.to_string(),
            capacity: 15,
            campus: campus.to_string(),
            is_active: active,
        }
    }

    #[test]
    fn test_find_active_filters_campus_and_inactive() {
        let repo = BusRepository::new(setup());
        repo.upsert(&bus("B2", "2号车", "EAST", true)).unwrap();
        repo.upsert(&bus("B1", "1号车", "EAST", true)).unwrap();
        repo.upsert(&bus("B3", "3号车", "WEST", true)).unwrap();
        repo.upsert(&bus("B4", "4号车", "EAST", false)).unwrap();

        let east = repo.find_active(Some("EAST")).unwrap();
        assert_eq!(east.iter().map(|b| b.bus_id.as_str()).collect::<Vec<_>>(), vec!["B1", "B2"]);

        let all = repo.find_active(None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(repo.find_by_id("B4").unwrap().is_some());
    }

    #[test]
    fn test_time_slot_round_trip() {
        let repo = TimeSlotRepository::new(setup());
        let slot = TimeSlot {
            slot_id: "TS1".to_string(),
            label: "放学第一班".to_string(),
            base_time: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            campus: "EAST".to_string(),
            direction: Direction::Dropoff,
            is_active: true,
            sort_order: 1,
        };
        repo.upsert(&slot).unwrap();

        assert_eq!(repo.find_by_id("TS1").unwrap(), Some(slot));
        assert_eq!(repo.find_active(Some("EAST"), Some(Direction::Dropoff)).unwrap().len(), 1);
        assert!(repo.find_active(Some("EAST"), Some(Direction::Pickup)).unwrap().is_empty());
    }
}
