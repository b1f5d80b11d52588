// ==========================================
// 校车线路编排系统 - 乘车资格判定引擎
// ==========================================
// 职责: 给定编排上下文, 判定哪些学员需要乘坐校车
// 输入: RouteContext (方向/排班模式/校区/星期/时段/日期)
// 输出: 有序学员列表 (常规: 班级+姓名; 特别日: 事件时间+班级+姓名)
// 红线: 查询失败必须返回错误, 不得伪装成“没有学员”
// ==========================================

use crate::domain::route::RouteContext;
use crate::domain::student::EligibleStudent;
use crate::domain::types::Direction;
use crate::engine::error::EngineResult;
use crate::repository::{RepositoryResult, StudentRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// EligibilitySource - 资格数据来源
// ==========================================
#[async_trait]
pub trait EligibilitySource: Send + Sync {
    /// 常规排班: 周课表匹配且该方向乘坐校车的启用学员
    async fn regular_students(
        &self,
        campus: &str,
        weekday: Weekday,
        time_slot_id: &str,
        direction: Direction,
    ) -> RepositoryResult<Vec<EligibleStudent>>;

    /// 特别日/假期: 指定日期与方向的有效接送事件
    async fn event_students(
        &self,
        date: NaiveDate,
        direction: Direction,
        campus: Option<&str>,
    ) -> RepositoryResult<Vec<EligibleStudent>>;
}

#[async_trait]
impl EligibilitySource for StudentRepository {
    async fn regular_students(
        &self,
        campus: &str,
        weekday: Weekday,
        time_slot_id: &str,
        direction: Direction,
    ) -> RepositoryResult<Vec<EligibleStudent>> {
        self.find_regular_eligible(campus, weekday, time_slot_id, direction)
    }

    async fn event_students(
        &self,
        date: NaiveDate,
        direction: Direction,
        campus: Option<&str>,
    ) -> RepositoryResult<Vec<EligibleStudent>> {
        self.find_event_eligible(date, direction, campus)
    }
}

// ==========================================
// EligibilityResolver - 资格判定
// ==========================================
#[derive(Clone)]
pub struct EligibilityResolver {
    source: Arc<dyn EligibilitySource>,
}

impl EligibilityResolver {
    pub fn new(source: Arc<dyn EligibilitySource>) -> Self {
        Self { source }
    }

    /// 判定上下文内的乘车学员
    ///
    /// # 返回
    /// - Ok(空列表): 条件不完整 (常规模式缺校区或时段, 日期模式缺日期) 或确实没有学员
    /// - Err: 数据来源查询失败
    #[instrument(skip(self, context), fields(mode = context.schedule_mode.as_str(), direction = %context.direction))]
    pub async fn resolve(&self, context: &RouteContext) -> EngineResult<Vec<EligibleStudent>> {
        let students = if context.schedule_mode.is_date_scoped() {
            let Some(date) = context.special_date else {
                tracing::debug!("日期模式未指定日期, 资格列表为空");
                return Ok(Vec::new());
            };
            self.source
                .event_students(date, context.direction, non_blank(context.campus.as_deref()))
                .await?
        } else {
            let campus = non_blank(context.campus.as_deref());
            let slot = non_blank(context.time_slot_id.as_deref());
            let (Some(campus), Some(slot)) = (campus, slot) else {
                tracing::debug!("常规模式缺少校区或时段, 资格列表为空");
                return Ok(Vec::new());
            };
            self.source
                .regular_students(campus, context.weekday, slot, context.direction)
                .await?
        };

        let resolved = dedup_by_student(students);
        tracing::debug!(count = resolved.len(), "资格判定完成");
        Ok(resolved)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 同一学员出现多次时保留首次出现
fn dedup_by_student(students: Vec<EligibleStudent>) -> Vec<EligibleStudent> {
    let mut seen = HashSet::new();
    students
        .into_iter()
        .filter(|s| seen.insert(s.student_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ScheduleMode;
    use crate::repository::RepositoryError;
    use chrono::NaiveTime;

    struct FixedSource {
        regular: Vec<EligibleStudent>,
        events: Vec<EligibleStudent>,
        fail: bool,
    }

    fn eligible(id: &str, time: Option<(u32, u32)>) -> EligibleStudent {
        EligibleStudent {
            student_id: id.to_string(),
            student_name: id.to_string(),
            class_name: "A".to_string(),
            campus: "EAST".to_string(),
            event_time: time.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
        }
    }

    #[async_trait]
    impl EligibilitySource for FixedSource {
        async fn regular_students(
            &self,
            _campus: &str,
            _weekday: Weekday,
            _time_slot_id: &str,
            _direction: Direction,
        ) -> RepositoryResult<Vec<EligibleStudent>> {
            if self.fail {
                return Err(RepositoryError::DatabaseConnectionError("offline".to_string()));
            }
            Ok(self.regular.clone())
        }

        async fn event_students(
            &self,
            _date: NaiveDate,
            _direction: Direction,
            _campus: Option<&str>,
        ) -> RepositoryResult<Vec<EligibleStudent>> {
            if self.fail {
                return Err(RepositoryError::DatabaseConnectionError("offline".to_string()));
            }
            Ok(self.events.clone())
        }
    }

    fn resolver(fail: bool) -> EligibilityResolver {
        EligibilityResolver::new(Arc::new(FixedSource {
            regular: vec![eligible("S1", None), eligible("S2", None)],
            events: vec![eligible("S3", Some((9, 0))), eligible("S3", Some((11, 0))), eligible("S4", Some((9, 0)))],
            fail,
        }))
    }

    #[tokio::test]
    async fn test_regular_requires_campus_and_slot() {
        let r = resolver(false);
        let mut ctx = RouteContext::regular("2026-S2", "EAST", Direction::Pickup, Weekday::Mon, "TS1");
        assert_eq!(r.resolve(&ctx).await.unwrap().len(), 2);

        ctx.time_slot_id = None;
        assert!(r.resolve(&ctx).await.unwrap().is_empty());

        ctx.time_slot_id = Some("TS1".to_string());
        ctx.campus = Some(" ".to_string());
        assert!(r.resolve(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dated_mode_dedups_students() {
        let r = resolver(false);
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let ctx = RouteContext::dated("2026-S2", None, Direction::Pickup, ScheduleMode::Vacation, date);

        let students = r.resolve(&ctx).await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].student_id, "S3");
        assert_eq!(students[0].event_time, NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_an_error_not_empty() {
        let r = resolver(true);
        let ctx = RouteContext::regular("2026-S2", "EAST", Direction::Pickup, Weekday::Mon, "TS1");
        assert!(r.resolve(&ctx).await.is_err());
    }
}
