// ==========================================
// 校车线路编排系统 - 学员数据仓储 (只读为主)
// ==========================================
// 学员主数据由教务系统维护, 这里的写入接口仅用于初始化与测试
// ==========================================

use crate::domain::student::{EligibleStudent, Student, TransportEvent, WeeklySchedule};
use crate::domain::types::{weekday_code, Direction, TransportMode};
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveTime, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// StudentRepository - 学员仓储
// ==========================================
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    pub fn upsert(&self, student: &Student) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO student (student_id, student_name, class_name, campus, is_active, pickup_mode, dropoff_mode)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(student_id) DO UPDATE SET
                student_name = excluded.student_name,
                class_name = excluded.class_name,
                campus = excluded.campus,
                is_active = excluded.is_active,
                pickup_mode = excluded.pickup_mode,
                dropoff_mode = excluded.dropoff_mode
            "#,
            params![
                student.student_id,
                student.student_name,
                student.class_name,
                student.campus,
                student.is_active,
                student.pickup_mode.as_str(),
                student.dropoff_mode.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_schedule(&self, schedule: &WeeklySchedule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO student_schedule (student_id, weekday, time_slot_id)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                schedule.student_id,
                weekday_code(schedule.weekday),
                schedule.time_slot_id,
            ],
        )?;
        Ok(())
    }

    pub fn insert_event(&self, event: &TransportEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO transport_event (event_id, student_id, event_date, direction, event_time, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                event.event_id,
                event.student_id,
                event.event_date.format("%Y-%m-%d").to_string(),
                event.direction.as_str(),
                event.event_time.format("%H:%M").to_string(),
                event.is_active,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, student_id: &str) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;
        let student = conn
            .query_row(
                r#"
                SELECT student_id, student_name, class_name, campus, is_active, pickup_mode, dropoff_mode
                FROM student WHERE student_id = ?1
                "#,
                params![student_id],
                map_student,
            )
            .optional()?;
        Ok(student)
    }

    /// 常规排班: 周课表匹配 (星期, 时段) 且该方向乘坐校车的启用学员
    pub fn find_regular_eligible(
        &self,
        campus: &str,
        weekday: Weekday,
        time_slot_id: &str,
        direction: Direction,
    ) -> RepositoryResult<Vec<EligibleStudent>> {
        let conn = self.get_conn()?;
        query_regular_eligible(&conn, campus, weekday, time_slot_id, direction)
    }

    /// 特别日/假期: 指定日期与方向的有效接送事件, 关联学员花名册
    ///
    /// 结果按事件时间、班级、姓名排序, 每行带事件的明确时间
    pub fn find_event_eligible(
        &self,
        date: NaiveDate,
        direction: Direction,
        campus: Option<&str>,
    ) -> RepositoryResult<Vec<EligibleStudent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.student_id, s.student_name, s.class_name, s.campus, e.event_time
            FROM transport_event e
            JOIN student s ON s.student_id = e.student_id
            WHERE e.event_date = ?1
              AND e.direction = ?2
              AND e.is_active = 1
              AND s.is_active = 1
              AND (?3 IS NULL OR s.campus = ?3)
            ORDER BY e.event_time, s.class_name, s.student_name, s.student_id
            "#,
        )?;

        let students = stmt
            .query_map(
                params![date.format("%Y-%m-%d").to_string(), direction.as_str(), campus],
                map_eligible_with_time,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(students)
    }
}

/// 常规资格查询 (供仓储内部复用同一连接, 如自动编排过程)
pub(crate) fn query_regular_eligible(
    conn: &Connection,
    campus: &str,
    weekday: Weekday,
    time_slot_id: &str,
    direction: Direction,
) -> RepositoryResult<Vec<EligibleStudent>> {
    // 方向只决定比较的列, 列名是常量, 不拼接外部输入
    let mode_column = match direction {
        Direction::Pickup => "pickup_mode",
        Direction::Dropoff => "dropoff_mode",
    };
    let sql = format!(
        r#"
        SELECT DISTINCT s.student_id, s.student_name, s.class_name, s.campus
        FROM student s
        JOIN student_schedule ss ON ss.student_id = s.student_id
        WHERE s.is_active = 1
          AND s.campus = ?1
          AND ss.weekday = ?2
          AND ss.time_slot_id = ?3
          AND s.{} = ?4
        ORDER BY s.class_name, s.student_name, s.student_id
        "#,
        mode_column
    );

    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map(
            params![
                campus,
                weekday_code(weekday),
                time_slot_id,
                TransportMode::Bus.as_str(),
            ],
            |row| {
                Ok(EligibleStudent {
                    student_id: row.get(0)?,
                    student_name: row.get(1)?,
                    class_name: row.get(2)?,
                    campus: row.get(3)?,
                    event_time: None,
                })
            },
        )?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(students)
}

fn map_student(row: &Row) -> SqliteResult<Student> {
    let pickup: String = row.get(5)?;
    let dropoff: String = row.get(6)?;
    Ok(Student {
        student_id: row.get(0)?,
        student_name: row.get(1)?,
        class_name: row.get(2)?,
        campus: row.get(3)?,
        is_active: row.get(4)?,
        pickup_mode: pickup.parse().map_err(|e| conversion_error(5, e))?,
        dropoff_mode: dropoff.parse().map_err(|e| conversion_error(6, e))?,
    })
}

fn map_eligible_with_time(row: &Row) -> SqliteResult<EligibleStudent> {
    let time_str: String = row.get(4)?;
    let event_time = parse_hhmm(&time_str).map_err(|e| conversion_error(4, e))?;
    Ok(EligibleStudent {
        student_id: row.get(0)?,
        student_name: row.get(1)?,
        class_name: row.get(2)?,
        campus: row.get(3)?,
        event_time: Some(event_time),
    })
}

/// 解析 "HH:MM" / "HH:MM:SS"
pub(crate) fn parse_hhmm(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("时间格式无效 {}: {}", s, e))
}
