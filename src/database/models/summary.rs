use serde::{Deserialize, Serialize};

use super::profile::LearnerProfile;

/// Per-category course counts as read from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category_type: String,
    pub total_courses: i64,
    pub completed_courses: i64,
}

/// One enrollment of the learner and whether its course is completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRecord {
    pub course_id: i64,
    pub timestart: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub category_group: String,
    pub total_courses: i64,
    pub completed_courses: i64,
    pub completion_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirtyDayStats {
    pub enrolled_courses_30days: i64,
    pub completed_courses_30days: i64,
    pub completion_rate_30days: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thirty_days_ago_timestamp: Option<i64>,
}

impl ThirtyDayStats {
    /// Zeroed stats without boundary timestamps, used when the read fails
    pub fn unavailable() -> Self {
        Self {
            enrolled_courses_30days: 0,
            completed_courses_30days: 0,
            completion_rate_30days: 0.0,
            current_timestamp: None,
            thirty_days_ago_timestamp: None,
        }
    }
}

/// Auxiliary metrics that may fall back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CompletedCourseCount,
    CategoryProgress,
    ThirtyDayStats,
    UserDegree,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::CompletedCourseCount => "completed_course_count",
            Metric::CategoryProgress => "category_progress",
            Metric::ThirtyDayStats => "thirty_day_stats",
            Metric::UserDegree => "user_degree",
        }
    }
}

/// Aggregated learning state for one learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub user_id: i64,
    pub profile: LearnerProfile,
    pub course_completed_count: i64,
    pub category_progress: Vec<CategoryProgress>,
    pub thirty_day_stats: ThirtyDayStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_degree: Option<String>,
    /// Metrics that fell back to defaults while building this summary
    #[serde(skip)]
    pub degraded: Vec<Metric>,
}

impl StudentSummary {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// `part / total` as a percentage rounded to one decimal; 0 when `total` is 0
pub fn completion_percent(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let percent = part as f64 / total as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(completion_percent(2, 4), 50.0);
        assert_eq!(completion_percent(1, 3), 33.3);
        assert_eq!(completion_percent(2, 3), 66.7);
        assert_eq!(completion_percent(5, 5), 100.0);
    }

    #[test]
    fn percent_of_empty_total_is_zero() {
        assert_eq!(completion_percent(0, 0), 0.0);
        assert_eq!(completion_percent(3, 0), 0.0);
    }

    #[test]
    fn unavailable_stats_omit_timestamps() {
        let json = serde_json::to_value(ThirtyDayStats::unavailable()).unwrap();
        assert_eq!(json["enrolled_courses_30days"], 0);
        assert!(json.get("current_timestamp").is_none());
        assert!(json.get("thirty_days_ago_timestamp").is_none());
    }
}
