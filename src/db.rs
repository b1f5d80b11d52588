// ==========================================
// 校车线路编排系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键/busy_timeout)
// - 提供幂等的建表脚本, 供应用启动与集成测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS bus (
    bus_id TEXT PRIMARY KEY,
    bus_name TEXT NOT NULL,
    capacity INTEGER NOT NULL CHECK (capacity >= 0),
    campus TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS time_slot (
    slot_id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    base_time TEXT NOT NULL,
    campus TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (direction IN ('PICKUP', 'DROPOFF')),
    is_active INTEGER NOT NULL DEFAULT 1,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS student (
    student_id TEXT PRIMARY KEY,
    student_name TEXT NOT NULL,
    class_name TEXT NOT NULL,
    campus TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    pickup_mode TEXT NOT NULL DEFAULT 'bus',
    dropoff_mode TEXT NOT NULL DEFAULT 'bus'
);

CREATE TABLE IF NOT EXISTS student_schedule (
    student_id TEXT NOT NULL REFERENCES student(student_id) ON DELETE CASCADE,
    weekday TEXT NOT NULL,
    time_slot_id TEXT NOT NULL REFERENCES time_slot(slot_id),
    PRIMARY KEY (student_id, weekday, time_slot_id)
);

CREATE TABLE IF NOT EXISTS transport_event (
    event_id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL REFERENCES student(student_id) ON DELETE CASCADE,
    event_date TEXT NOT NULL,
    direction TEXT NOT NULL,
    event_time TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS bus_route (
    route_id TEXT PRIMARY KEY,
    bus_id TEXT NOT NULL REFERENCES bus(bus_id),
    direction TEXT NOT NULL,
    slot_key TEXT NOT NULL,
    weekday TEXT NOT NULL,
    semester TEXT NOT NULL,
    confirmed INTEGER NOT NULL DEFAULT 0,
    estimated_minutes INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE (bus_id, direction, slot_key, weekday, semester)
);

CREATE TABLE IF NOT EXISTS route_block (
    block_id TEXT PRIMARY KEY,
    route_id TEXT NOT NULL REFERENCES bus_route(route_id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    extra_minutes INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS block_student (
    block_id TEXT NOT NULL REFERENCES route_block(block_id) ON DELETE CASCADE,
    student_id TEXT NOT NULL REFERENCES student(student_id),
    event_time TEXT,
    PRIMARY KEY (block_id, student_id)
);

CREATE TABLE IF NOT EXISTS route_change_log (
    log_id TEXT PRIMARY KEY,
    route_id TEXT NOT NULL,
    action TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_route_block_route ON route_block(route_id);
CREATE INDEX IF NOT EXISTS idx_block_student_student ON block_student(student_id);
CREATE INDEX IF NOT EXISTS idx_route_change_log_route ON route_change_log(route_id, created_at);
CREATE INDEX IF NOT EXISTS idx_transport_event_date ON transport_event(event_date, direction);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
