// ==========================================
// 校车线路编排系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 连接/锁, 事务, 查询与约束, 行映射字段
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 连接 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    // ===== 事务边界 (BEGIN / COMMIT) =====
    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ===== 语句执行 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ===== 行映射 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("UNIQUE") => {
                RepositoryError::UniqueConstraintViolation(msg)
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("FOREIGN KEY") => {
                RepositoryError::ForeignKeyViolation(msg)
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) => RepositoryError::DatabaseQueryError(msg),
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl RepositoryError {
    /// 行映射阶段的字段解析失败
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        RepositoryError::FieldValueError {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// 事务开启或提交失败
    ///
    /// 约束类错误 (延迟外键在 COMMIT 时报出) 保持原分类
    pub fn transaction(err: rusqlite::Error) -> Self {
        match RepositoryError::from(err) {
            RepositoryError::DatabaseQueryError(msg) => RepositoryError::DatabaseTransactionError(msg),
            other => other,
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 把领域层的字符串解析错误包装成 rusqlite 行映射错误
pub(crate) fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_sqlite_failures_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();

        let dup = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(matches!(RepositoryError::from(dup), RepositoryError::UniqueConstraintViolation(_)));

        let none = conn
            .query_row("SELECT id FROM t WHERE id = 'zzz'", [], |r| r.get::<_, String>(0))
            .unwrap_err();
        assert!(matches!(RepositoryError::from(none), RepositoryError::NotFound { .. }));

        let bad = conn.execute("SELECT * FROM missing_table", []).unwrap_err();
        assert!(matches!(RepositoryError::from(bad), RepositoryError::DatabaseQueryError(_)));
    }

    #[test]
    fn test_nested_begin_is_a_transaction_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("BEGIN").unwrap();

        let err = conn.transaction().map_err(RepositoryError::transaction).unwrap_err();
        assert!(matches!(err, RepositoryError::DatabaseTransactionError(_)));
    }
}
