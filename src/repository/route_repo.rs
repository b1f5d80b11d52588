// ==========================================
// 校车线路编排系统 - 线路/线路块数据仓储
// ==========================================
// 对齐: bus_route / route_block / block_student 表
// 红线: Repository 不含业务逻辑, 只做数据映射
// 红线: 多表写入必须在同一事务内完成
// ==========================================

use crate::domain::route::{Block, BlockStudent, Route, RouteKey, RouteSlot};
use crate::domain::types::{parse_weekday, weekday_code, Direction};
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use crate::repository::student_repo::parse_hhmm;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// RouteRepository - 线路仓储
// ==========================================
pub struct RouteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RouteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 线路
    // ==========================================

    /// 按复合键查找线路ID
    pub fn find_route_id(&self, key: &RouteKey) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        find_route_id_in(&conn, key)
    }

    pub fn find_route(&self, route_id: &str) -> RepositoryResult<Option<Route>> {
        let conn = self.get_conn()?;
        let route = conn
            .query_row(
                r#"
                SELECT route_id, bus_id, direction, slot_key, weekday, semester,
                       confirmed, estimated_minutes, updated_at
                FROM bus_route WHERE route_id = ?1
                "#,
                params![route_id],
                map_route,
            )
            .optional()?;
        Ok(route)
    }

    /// 查找线路, 不存在则创建
    pub fn ensure_route(&self, key: &RouteKey) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        ensure_route_in(&conn, key)
    }

    /// 标记线路已确认, 同时写入估算总时长
    pub fn confirm_route(&self, route_id: &str, estimated_minutes: u32) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE bus_route SET confirmed = 1, estimated_minutes = ?2, updated_at = ?3 WHERE route_id = ?1",
            params![route_id, estimated_minutes, now_str()],
        )?;
        if rows == 0 {
            return Err(not_found("bus_route", route_id));
        }
        Ok(())
    }

    // ==========================================
    // 线路块
    // ==========================================

    /// 加载线路下的所有线路块 (按 order_index, label 排序) 及其学员
    pub fn load_blocks(&self, route_id: &str) -> RepositoryResult<Vec<Block>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT block_id, route_id, label, order_index, extra_minutes
            FROM route_block
            WHERE route_id = ?1
            ORDER BY order_index, label, block_id
            "#,
        )?;
        let mut blocks = stmt
            .query_map(params![route_id], |row| {
                Ok(Block {
                    block_id: row.get(0)?,
                    route_id: Some(row.get(1)?),
                    label: row.get(2)?,
                    order_index: row.get(3)?,
                    extra_minutes: row.get(4)?,
                    students: Vec::new(),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut member_stmt = conn.prepare(
            r#"
            SELECT s.student_id, s.student_name, s.class_name, s.campus, bs.event_time
            FROM block_student bs
            JOIN student s ON s.student_id = bs.student_id
            WHERE bs.block_id = ?1
            ORDER BY bs.rowid
            "#,
        )?;
        for block in blocks.iter_mut() {
            block.students = member_stmt
                .query_map(params![block.block_id], map_block_student)?
                .collect::<SqliteResult<Vec<_>>>()?;
        }

        Ok(blocks)
    }

    /// 学员从一个线路块移动到另一个线路块 (单事务: 删除 + 插入)
    pub fn move_membership(
        &self,
        student_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let event_time: Option<String> = tx
            .query_row(
                "SELECT event_time FROM block_student WHERE block_id = ?1 AND student_id = ?2",
                params![from_block_id, student_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| not_found("block_student", &format!("{}/{}", from_block_id, student_id)))?;

        tx.execute(
            "DELETE FROM block_student WHERE block_id = ?1 AND student_id = ?2",
            params![from_block_id, student_id],
        )?;
        tx.execute(
            "INSERT INTO block_student (block_id, student_id, event_time) VALUES (?1, ?2, ?3)",
            params![to_block_id, student_id, event_time],
        )?;

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(())
    }

    /// 更新线路块的归属线路
    pub fn update_block_route(&self, block_id: &str, route_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE route_block SET route_id = ?2 WHERE block_id = ?1",
            params![block_id, route_id],
        )?;
        if rows == 0 {
            return Err(not_found("route_block", block_id));
        }
        Ok(())
    }

    /// 更新线路块顺序 (可同时更新归属线路)
    ///
    /// 只更新目标线路块本身, 不重排同线路其它块
    pub fn update_block_placement(
        &self,
        block_id: &str,
        route_id: Option<&str>,
        order_index: i32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE route_block
            SET order_index = ?2,
                route_id = COALESCE(?3, route_id)
            WHERE block_id = ?1
            "#,
            params![block_id, order_index, route_id],
        )?;
        if rows == 0 {
            return Err(not_found("route_block", block_id));
        }
        Ok(())
    }

    /// 批量删除线路块 (单事务, 成员随外键级联删除)
    pub fn delete_blocks(&self, block_ids: &[String]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let mut deleted = 0;
        for block_id in block_ids {
            deleted += tx.execute("DELETE FROM route_block WHERE block_id = ?1", params![block_id])?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(deleted)
    }

    /// 整体保存一组线路的线路块 (单事务)
    ///
    /// 对每条线路: 确保线路存在, 清空原线路块, 写入新线路块及成员, 重置确认状态
    ///
    /// # 返回
    /// 与输入顺序一致的线路ID列表
    pub fn save_layout(&self, layout: &[(RouteKey, Vec<Block>)]) -> RepositoryResult<Vec<String>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let mut route_ids = Vec::with_capacity(layout.len());
        for (key, blocks) in layout {
            let route_id = ensure_route_in(&tx, key)?;
            clear_route_blocks_in(&tx, &route_id)?;
            for block in blocks {
                insert_block_in(&tx, &route_id, block)?;
            }
            route_ids.push(route_id);
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(route_ids)
    }
}

// ==========================================
// 连接级辅助函数 (可在事务内复用)
// ==========================================

pub(crate) fn find_route_id_in(conn: &Connection, key: &RouteKey) -> RepositoryResult<Option<String>> {
    let id = conn
        .query_row(
            r#"
            SELECT route_id FROM bus_route
            WHERE bus_id = ?1 AND direction = ?2 AND slot_key = ?3 AND weekday = ?4 AND semester = ?5
            "#,
            params![
                key.bus_id,
                key.direction.as_str(),
                key.slot.as_key(),
                key.weekday_code(),
                key.semester,
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(crate) fn ensure_route_in(conn: &Connection, key: &RouteKey) -> RepositoryResult<String> {
    if let Some(id) = find_route_id_in(conn, key)? {
        return Ok(id);
    }

    let route_id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        r#"
        INSERT INTO bus_route (route_id, bus_id, direction, slot_key, weekday, semester, confirmed, estimated_minutes, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)
        "#,
        params![
            route_id,
            key.bus_id,
            key.direction.as_str(),
            key.slot.as_key(),
            weekday_code(key.weekday),
            key.semester,
            now_str(),
        ],
    )?;
    Ok(route_id)
}

/// 清空线路下的线路块, 并重置确认状态
pub(crate) fn clear_route_blocks_in(conn: &Connection, route_id: &str) -> RepositoryResult<()> {
    conn.execute("DELETE FROM route_block WHERE route_id = ?1", params![route_id])?;
    conn.execute(
        "UPDATE bus_route SET confirmed = 0, updated_at = ?2 WHERE route_id = ?1",
        params![route_id, now_str()],
    )?;
    Ok(())
}

pub(crate) fn insert_block_in(conn: &Connection, route_id: &str, block: &Block) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO route_block (block_id, route_id, label, order_index, extra_minutes)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![block.block_id, route_id, block.label, block.order_index, block.extra_minutes],
    )?;
    for student in &block.students {
        conn.execute(
            "INSERT INTO block_student (block_id, student_id, event_time) VALUES (?1, ?2, ?3)",
            params![
                block.block_id,
                student.student_id,
                student.event_time.map(|t| t.format("%H:%M").to_string()),
            ],
        )?;
    }
    Ok(())
}

fn now_str() -> String {
    chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn not_found(entity: &str, id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

fn map_route(row: &Row) -> SqliteResult<Route> {
    let direction_str: String = row.get(2)?;
    let slot_key: String = row.get(3)?;
    let weekday_str: String = row.get(4)?;
    let updated_at_str: String = row.get(8)?;

    let direction = direction_str
        .parse::<Direction>()
        .map_err(|e| conversion_error(2, e))?;
    let slot = RouteSlot::parse_key(&slot_key).map_err(|e| conversion_error(3, e))?;
    let weekday = parse_weekday(&weekday_str).map_err(|e| conversion_error(4, e))?;
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TS_FORMAT)
        .map_err(|e| conversion_error(8, format!("updated_at 无效: {}", e)))?;

    Ok(Route {
        route_id: row.get(0)?,
        key: RouteKey {
            bus_id: row.get(1)?,
            direction,
            slot,
            weekday,
            semester: row.get(5)?,
        },
        confirmed: row.get(6)?,
        estimated_minutes: row.get(7)?,
        updated_at,
    })
}

fn map_block_student(row: &Row) -> SqliteResult<BlockStudent> {
    let event_time_str: Option<String> = row.get(4)?;
    let event_time = match event_time_str {
        Some(s) => Some(parse_hhmm(&s).map_err(|e| conversion_error(4, e))?),
        None => None,
    };
    Ok(BlockStudent {
        student_id: row.get(0)?,
        student_name: row.get(1)?,
        class_name: row.get(2)?,
        campus: row.get(3)?,
        event_time,
    })
}
