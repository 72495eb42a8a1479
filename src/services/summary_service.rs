use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    completion_percent, CategoryCount, CategoryProgress, EnrollmentRecord, LearnerProfile, Metric,
    SkillCategory, StudentSummary, ThirtyDayStats, ThirtyDayWindow,
};
use crate::database::store::LearnerStore;

pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("No student found with id {0}")]
    NotFound(i64),

    #[error("Database connection failed: {0}")]
    Connection(#[source] DatabaseError),

    #[error("Query failed: {0}")]
    Unexpected(String),
}

impl From<DatabaseError> for SummaryError {
    fn from(err: DatabaseError) -> Self {
        if err.is_connection() {
            SummaryError::Connection(err)
        } else {
            SummaryError::Unexpected(err.to_string())
        }
    }
}

/// Builds learner summaries from a `LearnerStore`.
///
/// Only the profile lookup can fail a summary. The auxiliary metrics are read
/// concurrently once the profile exists, and each one falls back to its
/// default when its read fails.
#[derive(Clone)]
pub struct SummaryService {
    store: Arc<dyn LearnerStore>,
}

impl SummaryService {
    pub fn new(store: Arc<dyn LearnerStore>) -> Self {
        Self { store }
    }

    pub async fn get_summary(&self, user_id: i64) -> Result<StudentSummary, SummaryError> {
        self.get_summary_at(user_id, Utc::now()).await
    }

    /// Same as `get_summary` with the thirty-day window ending at `now`
    pub async fn get_summary_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<StudentSummary, SummaryError> {
        let profile = self.get_profile(user_id).await?;
        let window = ThirtyDayWindow::ending_at(now);
        let labels = SkillCategory::labels();

        let (completed, categories, enrollments, degree) = futures::join!(
            self.store.completed_course_count(user_id),
            self.store.category_counts(user_id, &labels),
            self.store.enrollments_in_window(user_id, window),
            self.store.degree(user_id),
        );

        let mut degraded = Vec::new();

        let course_completed_count =
            or_default(user_id, Metric::CompletedCourseCount, completed, &mut degraded)
                .unwrap_or(0);

        let category_progress =
            or_default(user_id, Metric::CategoryProgress, categories, &mut degraded)
                .map(|counts| build_category_progress(&counts))
                .unwrap_or_default();

        let thirty_day_stats =
            or_default(user_id, Metric::ThirtyDayStats, enrollments, &mut degraded)
                .map(|records| build_thirty_day_stats(window, &records))
                .unwrap_or_else(ThirtyDayStats::unavailable);

        let user_degree = or_default(user_id, Metric::UserDegree, degree, &mut degraded)
            .flatten()
            .filter(|d| !d.trim().is_empty());

        debug!(
            "Built summary for user {} ({} degraded metrics)",
            user_id,
            degraded.len()
        );

        Ok(StudentSummary {
            user_id,
            profile,
            course_completed_count,
            category_progress,
            thirty_day_stats,
            user_degree,
            degraded,
        })
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<LearnerProfile, SummaryError> {
        self.store
            .find_profile(user_id)
            .await?
            .ok_or(SummaryError::NotFound(user_id))
    }

    /// Newest learners first; `limit` defaults to 10 and is clamped to 1..=100
    pub async fn recent_learners(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<LearnerProfile>, SummaryError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        Ok(self.store.recent_profiles(limit).await?)
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.store.ping().await
    }
}

fn or_default<T>(
    user_id: i64,
    metric: Metric,
    result: Result<T, DatabaseError>,
    degraded: &mut Vec<Metric>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "Metric '{}' failed for user {}, using default: {}",
                metric.name(),
                user_id,
                e
            );
            degraded.push(metric);
            None
        }
    }
}

/// One entry per known category, ordered by label; missing categories report zeros
pub fn build_category_progress(counts: &[CategoryCount]) -> Vec<CategoryProgress> {
    let mut progress: Vec<CategoryProgress> = SkillCategory::ALL
        .iter()
        .map(|category| {
            let label = category.label();
            let (total, completed) = counts
                .iter()
                .find(|c| c.category_type == label)
                .map(|c| (c.total_courses, c.completed_courses.min(c.total_courses)))
                .unwrap_or((0, 0));

            CategoryProgress {
                category_group: label.to_string(),
                total_courses: total,
                completed_courses: completed,
                completion_percent: completion_percent(completed, total),
            }
        })
        .collect();

    progress.sort_by(|a, b| a.category_group.cmp(&b.category_group));
    progress
}

/// Distinct enrolled and completed courses among enrollments inside `window`
pub fn build_thirty_day_stats(
    window: ThirtyDayWindow,
    records: &[EnrollmentRecord],
) -> ThirtyDayStats {
    let in_window = records.iter().filter(|r| window.contains(r.timestart));

    let mut enrolled = BTreeSet::new();
    let mut completed = BTreeSet::new();
    for record in in_window {
        enrolled.insert(record.course_id);
        if record.completed {
            completed.insert(record.course_id);
        }
    }

    let enrolled_count = enrolled.len() as i64;
    let completed_count = completed.len() as i64;

    ThirtyDayStats {
        enrolled_courses_30days: enrolled_count,
        completed_courses_30days: completed_count,
        completion_rate_30days: completion_percent(completed_count, enrolled_count),
        current_timestamp: Some(window.end),
        thirty_days_ago_timestamp: Some(window.start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_profile, InMemoryLearnerStore};
    use chrono::TimeZone;

    fn service(store: InMemoryLearnerStore) -> (SummaryService, Arc<InMemoryLearnerStore>) {
        let store = Arc::new(store);
        (SummaryService::new(store.clone()), store)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_profile_short_circuits() {
        let (service, store) = service(InMemoryLearnerStore::new());

        let err = service.get_summary(42).await.unwrap_err();

        assert!(matches!(err, SummaryError::NotFound(42)));
        assert_eq!(store.calls("find_profile"), 1);
        assert_eq!(store.auxiliary_calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_is_connection_error() {
        let (service, store) = service(InMemoryLearnerStore::new().unreachable());

        let err = service.get_summary(1).await.unwrap_err();

        assert!(matches!(err, SummaryError::Connection(_)));
        assert_eq!(store.auxiliary_calls(), 0);
    }

    #[tokio::test]
    async fn failed_count_defaults_to_zero() {
        let (service, _) = service(
            InMemoryLearnerStore::new()
                .with_profile(sample_profile(7))
                .with_course(100, "閱讀")
                .with_completion(7, 100)
                .failing(Metric::CompletedCourseCount),
        );

        let summary = service.get_summary(7).await.unwrap();

        assert_eq!(summary.course_completed_count, 0);
        assert_eq!(summary.degraded, vec![Metric::CompletedCourseCount]);
        let reading = summary
            .category_progress
            .iter()
            .find(|c| c.category_group == "閱讀")
            .unwrap();
        assert_eq!(reading.completion_percent, 100.0);
    }

    #[tokio::test]
    async fn every_metric_failing_still_returns_profile() {
        let (service, _) = service(
            InMemoryLearnerStore::new()
                .with_profile(sample_profile(7))
                .with_degree(7, "B1")
                .failing(Metric::CompletedCourseCount)
                .failing(Metric::CategoryProgress)
                .failing(Metric::ThirtyDayStats)
                .failing(Metric::UserDegree),
        );

        let summary = service.get_summary(7).await.unwrap();

        assert_eq!(summary.profile.id, 7);
        assert!(summary.category_progress.is_empty());
        assert_eq!(summary.thirty_day_stats, ThirtyDayStats::unavailable());
        assert_eq!(summary.user_degree, None);
        assert_eq!(summary.degraded.len(), 4);
    }

    #[tokio::test]
    async fn empty_category_reports_zero_percent() {
        let (service, _) = service(
            InMemoryLearnerStore::new()
                .with_profile(sample_profile(7))
                .with_course(1, "文法"),
        );

        let summary = service.get_summary(7).await.unwrap();

        assert_eq!(summary.category_progress.len(), SkillCategory::ALL.len());
        let writing = summary
            .category_progress
            .iter()
            .find(|c| c.category_group == "寫作")
            .unwrap();
        assert_eq!(writing.total_courses, 0);
        assert_eq!(writing.completion_percent, 0.0);
    }

    #[tokio::test]
    async fn category_order_is_stable() {
        let store = InMemoryLearnerStore::new()
            .with_profile(sample_profile(7))
            .with_course(1, "聽力")
            .with_course(2, "口說")
            .with_course(3, "其他")
            .with_completion(7, 2);
        let (service, _) = service(store);

        let first = service.get_summary(7).await.unwrap().category_progress;
        let second = service.get_summary(7).await.unwrap().category_progress;

        assert_eq!(first, second);
        let labels: Vec<_> = first.iter().map(|c| c.category_group.clone()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }

    #[tokio::test]
    async fn thirty_day_window_includes_lower_bound() {
        let now = fixed_now();
        let boundary = ThirtyDayWindow::ending_at(now).start;
        let (service, _) = service(
            InMemoryLearnerStore::new()
                .with_profile(sample_profile(7))
                .with_enrollment(7, 10, boundary)
                .with_enrollment(7, 11, boundary - 1)
                .with_completion(7, 10),
        );

        let stats = service.get_summary_at(7, now).await.unwrap().thirty_day_stats;

        assert_eq!(stats.enrolled_courses_30days, 1);
        assert_eq!(stats.completed_courses_30days, 1);
        assert_eq!(stats.completion_rate_30days, 100.0);
        assert_eq!(stats.current_timestamp, Some(now.timestamp()));
        assert_eq!(stats.thirty_days_ago_timestamp, Some(boundary));
    }

    #[tokio::test]
    async fn no_recent_enrollments_gives_zero_rate() {
        let now = fixed_now();
        let (service, _) = service(InMemoryLearnerStore::new().with_profile(sample_profile(7)));

        let stats = service.get_summary_at(7, now).await.unwrap().thirty_day_stats;

        assert_eq!(stats.enrolled_courses_30days, 0);
        assert_eq!(stats.completion_rate_30days, 0.0);
        assert!(stats.current_timestamp.is_some());
    }

    #[tokio::test]
    async fn blank_degree_is_absent() {
        let (service, _) = service(
            InMemoryLearnerStore::new()
                .with_profile(sample_profile(7))
                .with_degree(7, "  "),
        );

        let summary = service.get_summary(7).await.unwrap();
        assert_eq!(summary.user_degree, None);
        assert!(!summary.is_degraded());
    }

    #[tokio::test]
    async fn recent_limit_is_clamped() {
        let mut store = InMemoryLearnerStore::new();
        for id in 1..=3 {
            store = store.with_profile(sample_profile(id));
        }
        let (service, _) = service(store);

        assert_eq!(service.recent_learners(Some(0)).await.unwrap().len(), 1);
        let all = service.recent_learners(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].timecreated >= all[1].timecreated);
    }

    #[test]
    fn thirty_day_stats_count_distinct_courses() {
        let window = ThirtyDayWindow { start: 100, end: 200 };
        let records = vec![
            EnrollmentRecord {
                course_id: 1,
                timestart: 150,
                completed: true,
            },
            EnrollmentRecord {
                course_id: 1,
                timestart: 160,
                completed: true,
            },
            EnrollmentRecord {
                course_id: 2,
                timestart: 170,
                completed: false,
            },
            EnrollmentRecord {
                course_id: 3,
                timestart: 180,
                completed: false,
            },
        ];

        let stats = build_thirty_day_stats(window, &records);
        assert_eq!(stats.enrolled_courses_30days, 3);
        assert_eq!(stats.completed_courses_30days, 1);
        assert_eq!(stats.completion_rate_30days, 33.3);
    }
}
