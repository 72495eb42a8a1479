use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::Row;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{CategoryCount, EnrollmentRecord, LearnerProfile, ThirtyDayWindow};
use crate::database::store::LearnerStore;

const PROFILE_COLUMNS: &str = "id, username, email, city, \
     CAST(timecreated AS SIGNED) AS timecreated, lastname, firstname, \
     CAST(loginday AS SIGNED) AS loginday";

/// `LearnerStore` over the Moodle MySQL schema, reached through the tunnel
pub struct MySqlLearnerStore {
    manager: Arc<DatabaseManager>,
    query_timeout: Duration,
    slow_query_threshold: Option<Duration>,
}

impl MySqlLearnerStore {
    pub fn new(manager: Arc<DatabaseManager>, config: &DatabaseConfig) -> Self {
        Self {
            manager,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            slow_query_threshold: config
                .enable_slow_query_warning
                .then(|| Duration::from_millis(config.slow_query_threshold_ms)),
        }
    }

    /// Run one query under the per-query timeout, logging slow ones
    async fn timed<T, F>(&self, query: &'static str, fut: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| DatabaseError::Timeout {
                query,
                after: self.query_timeout,
            })?;

        let elapsed = started.elapsed();
        match self.slow_query_threshold {
            Some(threshold) if elapsed > threshold => {
                warn!("Slow query '{}' took {:?}", query, elapsed)
            }
            _ => debug!("Query '{}' took {:?}", query, elapsed),
        }

        Ok(result?)
    }
}

#[async_trait]
impl LearnerStore for MySqlLearnerStore {
    async fn find_profile(&self, user_id: i64) -> Result<Option<LearnerProfile>, DatabaseError> {
        let conn = self.manager.acquire().await?;
        let sql = format!("SELECT {} FROM mdl_user WHERE id = ?", PROFILE_COLUMNS);

        self.timed(
            "profile",
            sqlx::query_as::<_, LearnerProfile>(&sql)
                .bind(user_id)
                .fetch_optional(conn.pool()),
        )
        .await
    }

    async fn completed_course_count(&self, user_id: i64) -> Result<i64, DatabaseError> {
        let conn = self.manager.acquire().await?;

        let count: (i64,) = self
            .timed(
                "completed_course_count",
                sqlx::query_as(
                    "SELECT COUNT(DISTINCT course) FROM mdl_course_completions WHERE userid = ?",
                )
                .bind(user_id)
                .fetch_one(conn.pool()),
            )
            .await?;

        Ok(count.0)
    }

    async fn category_counts(
        &self,
        user_id: i64,
        labels: &[&'static str],
    ) -> Result<Vec<CategoryCount>, DatabaseError> {
        if labels.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.manager.acquire().await?;

        let placeholders = vec!["?"; labels.len()].join(", ");
        let sql = format!(
            r#"
            SELECT
                cc.category_type AS category_type,
                COUNT(DISTINCT c.id) AS total_courses,
                COUNT(DISTINCT ccpl.course) AS completed_courses
            FROM mdl_course_categories cc
            JOIN mdl_course c
                ON cc.id = c.category
            LEFT JOIN mdl_course_completions ccpl
                ON ccpl.course = c.id
                AND ccpl.userid = ?
            WHERE cc.category_type IN ({})
            GROUP BY cc.category_type
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(user_id);
        for label in labels {
            query = query.bind(*label);
        }

        let rows = self.timed("category_counts", query.fetch_all(conn.pool())).await?;

        rows.iter()
            .map(|row| {
                Ok(CategoryCount {
                    category_type: row.try_get("category_type")?,
                    total_courses: row.try_get("total_courses")?,
                    completed_courses: row.try_get("completed_courses")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn enrollments_in_window(
        &self,
        user_id: i64,
        window: ThirtyDayWindow,
    ) -> Result<Vec<EnrollmentRecord>, DatabaseError> {
        let conn = self.manager.acquire().await?;

        let rows = self
            .timed(
                "enrollments_in_window",
                sqlx::query(
                    r#"
                    SELECT
                        CAST(e.courseid AS SIGNED) AS course_id,
                        CAST(ue.timestart AS SIGNED) AS timestart,
                        CAST(cc.id IS NOT NULL AS SIGNED) AS completed
                    FROM mdl_user_enrolments ue
                    JOIN mdl_enrol e ON e.id = ue.enrolid
                    LEFT JOIN mdl_course_completions cc
                        ON cc.course = e.courseid AND cc.userid = ue.userid
                    WHERE ue.userid = ?
                    AND ue.timestart >= ?
                    AND ue.timestart <= ?
                    "#,
                )
                .bind(user_id)
                .bind(window.start)
                .bind(window.end)
                .fetch_all(conn.pool()),
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(EnrollmentRecord {
                    course_id: row.try_get("course_id")?,
                    timestart: row.try_get("timestart")?,
                    completed: row.try_get::<i64, _>("completed")? != 0,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn degree(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let conn = self.manager.acquire().await?;

        let row = self
            .timed(
                "degree",
                sqlx::query("SELECT CAST(degree AS CHAR) AS degree FROM mdl_user WHERE id = ?")
                    .bind(user_id)
                    .fetch_optional(conn.pool()),
            )
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("degree")?),
            None => Ok(None),
        }
    }

    async fn recent_profiles(&self, limit: u32) -> Result<Vec<LearnerProfile>, DatabaseError> {
        let conn = self.manager.acquire().await?;
        let sql = format!(
            "SELECT {} FROM mdl_user ORDER BY timecreated DESC LIMIT ?",
            PROFILE_COLUMNS
        );

        self.timed(
            "recent_profiles",
            sqlx::query_as::<_, LearnerProfile>(&sql)
                .bind(limit)
                .fetch_all(conn.pool()),
        )
        .await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.manager.acquire().await?;
        self.timed("ping", sqlx::query("SELECT 1").execute(conn.pool()))
            .await?;
        Ok(())
    }
}
