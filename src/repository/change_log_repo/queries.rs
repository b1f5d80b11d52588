use super::core::{ChangeLogRepository, TS_FORMAT};
use crate::domain::change_log::ChangeLogEntry;
use crate::repository::error::{conversion_error, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

impl ChangeLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询指定线路的变更日志 (最新在前)
    pub fn find_by_route(&self, route_id: &str) -> RepositoryResult<Vec<ChangeLogEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, route_id, action, payload_json, created_at
            FROM route_change_log
            WHERE route_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let entries = stmt
            .query_map(params![route_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(entries)
    }

    /// 查询最近 N 条日志
    pub fn find_recent(&self, limit: u32) -> RepositoryResult<Vec<ChangeLogEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, route_id, action, payload_json, created_at
            FROM route_change_log
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let entries = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(entries)
    }

    /// 统计指定线路的日志条数
    pub fn count_by_route(&self, route_id: &str) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM route_change_log WHERE route_id = ?1",
            params![route_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// 统计全部日志条数
    pub fn count_all(&self) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM route_change_log", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn map_row(row: &Row) -> SqliteResult<ChangeLogEntry> {
    let payload_str: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;

    // 解析时间戳
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TS_FORMAT)
        .map_err(|e| conversion_error(4, format!("created_at 无效 {}: {}", created_at_str, e)))?;

    // 解析 JSON 负载
    let payload_json = serde_json::from_str(&payload_str)
        .map_err(|e| conversion_error(3, format!("payload_json 无效: {}", e)))?;

    Ok(ChangeLogEntry {
        log_id: row.get(0)?,
        route_id: row.get(1)?,
        action: row.get(2)?,
        payload_json,
        created_at,
    })
}
