// handlers/mdl_user.rs - learner summary endpoints under /api/chat/mdl_user

use axum::extract::{rejection::QueryRejection, Path, Query, State};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{LearnerProfile, StudentSummary};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

/// GET /api/chat/mdl_user/:user_id - full learner summary
pub async fn mdl_user_get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<StudentSummary> {
    let user_id = parse_user_id(&user_id)?;
    let summary = state.summaries.get_summary(user_id).await?;

    if summary.is_degraded() {
        tracing::info!(
            "Summary for user {} served with defaults for {:?}",
            user_id,
            summary.degraded
        );
    }

    Ok(ApiResponse::success(summary).with_message("Student data retrieved"))
}

/// GET /api/chat/mdl_user/:user_id/profile - identity fields only
pub async fn mdl_user_profile_get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<LearnerProfile> {
    let user_id = parse_user_id(&user_id)?;
    let profile = state.summaries.get_profile(user_id).await?;
    Ok(ApiResponse::success(profile).with_message("Student profile retrieved"))
}

/// GET /api/chat/mdl_user?limit=N - most recently registered learners
pub async fn mdl_user_list(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Vec<LearnerProfile>> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    })?;
    let profiles = state.summaries.recent_learners(query.limit).await?;
    let message = format!("Retrieved {} recent students", profiles.len());
    Ok(ApiResponse::success(profiles).with_message(message))
}

fn parse_user_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Invalid user id '{}': expected a positive integer",
                raw
            ))
        })
}
