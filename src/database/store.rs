use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{CategoryCount, EnrollmentRecord, LearnerProfile, ThirtyDayWindow};

/// Read-only access to learner data.
///
/// Each method is a single query so callers can decide per read whether a
/// failure is fatal or degrades to a default.
#[async_trait]
pub trait LearnerStore: Send + Sync {
    async fn find_profile(&self, user_id: i64) -> Result<Option<LearnerProfile>, DatabaseError>;

    async fn completed_course_count(&self, user_id: i64) -> Result<i64, DatabaseError>;

    /// Course totals and the learner's completions for each category label given
    async fn category_counts(
        &self,
        user_id: i64,
        labels: &[&'static str],
    ) -> Result<Vec<CategoryCount>, DatabaseError>;

    /// Enrollments whose start time falls inside `window`
    async fn enrollments_in_window(
        &self,
        user_id: i64,
        window: ThirtyDayWindow,
    ) -> Result<Vec<EnrollmentRecord>, DatabaseError>;

    async fn degree(&self, user_id: i64) -> Result<Option<String>, DatabaseError>;

    /// Most recently created learners first
    async fn recent_profiles(&self, limit: u32) -> Result<Vec<LearnerProfile>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
