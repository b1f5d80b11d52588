use crate::domain::change_log::ChangeLogEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ==========================================
// ChangeLogRepository - 线路变更日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ChangeLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ChangeLogRepository {
    /// 创建新的变更日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加变更日志
    ///
    /// # 返回
    /// - `Ok(log_id)`: 成功插入
    /// - `Err(...)`: 数据库错误
    pub fn append(&self, entry: &ChangeLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_entry(&conn, entry)?;
        Ok(entry.log_id.clone())
    }

    /// 批量追加 (单事务)
    pub fn append_batch(&self, entries: &[ChangeLogEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        for entry in entries {
            insert_entry(&tx, entry)?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(entries.len())
    }
}

/// 在给定连接/事务上插入一条日志
pub(crate) fn insert_entry(conn: &Connection, entry: &ChangeLogEntry) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO route_change_log (log_id, route_id, action, payload_json, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            entry.log_id,
            entry.route_id,
            entry.action,
            entry.payload_json.to_string(),
            entry.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}
