// ==========================================
// 校车线路编排系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::routing_config::{ConfigError, RoutingConfig, RoutingConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const BLOCK_CHUNK_SIZE: &str = "route/block_chunk_size";
    pub const PER_STUDENT_MINUTES: &str = "route/per_student_minutes";
    pub const MIN_BLOCK_MINUTES: &str = "route/min_block_minutes";
    pub const PICKUP_BASE_MINUTES: &str = "route/pickup_base_minutes";
    pub const DROPOFF_BASE_MINUTES: &str = "route/dropoff_base_minutes";
    pub const MAX_ROUTE_MINUTES: &str = "route/max_route_minutes";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置值; 不存在时取默认值, 无法解析时报错
    fn get_parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_global_config_value(key)? {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| format!("配置项 {} 取值无效 ({}): {}", key, raw, e).into()),
            None => Ok(default),
        }
    }
}

// ==========================================
// RoutingConfigReader Trait 实现
// ==========================================
#[async_trait]
impl RoutingConfigReader for ConfigManager {
    async fn load_routing_config(&self) -> Result<RoutingConfig, ConfigError> {
        let d = RoutingConfig::default();
        let config = RoutingConfig {
            block_chunk_size: self.get_parsed_or(config_keys::BLOCK_CHUNK_SIZE, d.block_chunk_size)?,
            per_student_minutes: self.get_parsed_or(config_keys::PER_STUDENT_MINUTES, d.per_student_minutes)?,
            min_block_minutes: self.get_parsed_or(config_keys::MIN_BLOCK_MINUTES, d.min_block_minutes)?,
            pickup_base_minutes: self.get_parsed_or(config_keys::PICKUP_BASE_MINUTES, d.pickup_base_minutes)?,
            dropoff_base_minutes: self.get_parsed_or(config_keys::DROPOFF_BASE_MINUTES, d.dropoff_base_minutes)?,
            max_route_minutes: self.get_parsed_or(config_keys::MAX_ROUTE_MINUTES, d.max_route_minutes)?,
        };
        config.validate()?;
        Ok(config)
    }
}
