//! In-memory `LearnerStore` with per-query call counters and failure injection.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    CategoryCount, EnrollmentRecord, LearnerProfile, Metric, ThirtyDayWindow,
};
use crate::database::store::LearnerStore;

const AUXILIARY_QUERIES: [&str; 4] = [
    "completed_course_count",
    "category_counts",
    "enrollments_in_window",
    "degree",
];

struct Enrollment {
    user_id: i64,
    course_id: i64,
    timestart: i64,
}

/// Seeded learner data that answers queries the way the MySQL store does
#[derive(Default)]
pub struct InMemoryLearnerStore {
    profiles: BTreeMap<i64, LearnerProfile>,
    degrees: HashMap<i64, String>,
    courses: BTreeMap<i64, String>,
    completions: HashMap<i64, BTreeSet<i64>>,
    enrollments: Vec<Enrollment>,
    failing: HashSet<Metric>,
    unreachable: bool,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl InMemoryLearnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: LearnerProfile) -> Self {
        self.profiles.insert(profile.id, profile);
        self
    }

    pub fn with_degree(mut self, user_id: i64, degree: &str) -> Self {
        self.degrees.insert(user_id, degree.to_string());
        self
    }

    /// Add a course under a category label
    pub fn with_course(mut self, course_id: i64, category: &str) -> Self {
        self.courses.insert(course_id, category.to_string());
        self
    }

    pub fn with_completion(mut self, user_id: i64, course_id: i64) -> Self {
        self.completions.entry(user_id).or_default().insert(course_id);
        self
    }

    pub fn with_enrollment(mut self, user_id: i64, course_id: i64, timestart: i64) -> Self {
        self.enrollments.push(Enrollment {
            user_id,
            course_id,
            timestart,
        });
        self
    }

    /// Make the read behind `metric` fail with a query error
    pub fn failing(mut self, metric: Metric) -> Self {
        self.failing.insert(metric);
        self
    }

    /// Make every read fail as if the tunnel were down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self, query: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(query).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Calls to any read other than the profile lookup
    pub fn auxiliary_calls(&self) -> usize {
        AUXILIARY_QUERIES.iter().map(|q| self.calls(q)).sum()
    }

    fn record(&self, query: &'static str, metric: Option<Metric>) -> Result<(), DatabaseError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(query).or_insert(0) += 1;
        }
        if self.unreachable {
            return Err(DatabaseError::ConnectionError("tunnel is down".to_string()));
        }
        match metric {
            Some(metric) if self.failing.contains(&metric) => Err(DatabaseError::Sqlx(
                sqlx::Error::Protocol(format!("{} query rejected", metric.name())),
            )),
            _ => Ok(()),
        }
    }

    fn completed_by(&self, user_id: i64) -> BTreeSet<i64> {
        self.completions.get(&user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LearnerStore for InMemoryLearnerStore {
    async fn find_profile(&self, user_id: i64) -> Result<Option<LearnerProfile>, DatabaseError> {
        self.record("find_profile", None)?;
        Ok(self.profiles.get(&user_id).cloned())
    }

    async fn completed_course_count(&self, user_id: i64) -> Result<i64, DatabaseError> {
        self.record("completed_course_count", Some(Metric::CompletedCourseCount))?;
        Ok(self.completed_by(user_id).len() as i64)
    }

    async fn category_counts(
        &self,
        user_id: i64,
        labels: &[&'static str],
    ) -> Result<Vec<CategoryCount>, DatabaseError> {
        self.record("category_counts", Some(Metric::CategoryProgress))?;
        let completed = self.completed_by(user_id);

        let mut grouped: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
        for (course_id, category) in &self.courses {
            if !labels.iter().any(|label| *label == category.as_str()) {
                continue;
            }
            let entry = grouped.entry(category.as_str()).or_insert((0, 0));
            entry.0 += 1;
            if completed.contains(course_id) {
                entry.1 += 1;
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(category, (total, done))| CategoryCount {
                category_type: category.to_string(),
                total_courses: total,
                completed_courses: done,
            })
            .collect())
    }

    async fn enrollments_in_window(
        &self,
        user_id: i64,
        window: ThirtyDayWindow,
    ) -> Result<Vec<EnrollmentRecord>, DatabaseError> {
        self.record("enrollments_in_window", Some(Metric::ThirtyDayStats))?;
        let completed = self.completed_by(user_id);

        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id && window.contains(e.timestart))
            .map(|e| EnrollmentRecord {
                course_id: e.course_id,
                timestart: e.timestart,
                completed: completed.contains(&e.course_id),
            })
            .collect())
    }

    async fn degree(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        self.record("degree", Some(Metric::UserDegree))?;
        Ok(self.degrees.get(&user_id).cloned())
    }

    async fn recent_profiles(&self, limit: u32) -> Result<Vec<LearnerProfile>, DatabaseError> {
        self.record("recent_profiles", None)?;
        let mut profiles: Vec<_> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.timecreated.cmp(&a.timecreated));
        profiles.truncate(limit as usize);
        Ok(profiles)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.record("ping", None)
    }
}

/// A plausible learner profile for `id`
pub fn sample_profile(id: i64) -> LearnerProfile {
    LearnerProfile {
        id,
        username: format!("learner{}", id),
        email: format!("learner{}@example.com", id),
        city: "Taipei".to_string(),
        timecreated: 1_700_000_000 + id,
        lastname: "Chen".to_string(),
        firstname: format!("Learner{}", id),
        loginday: Some(12),
    }
}
