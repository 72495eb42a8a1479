use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET / - service name and version
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Learner Summary API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "summary": "/api/chat/mdl_user/:user_id",
                "profile": "/api/chat/mdl_user/:user_id/profile",
                "recent": "/api/chat/mdl_user?limit=N",
                "health": "/health",
            }
        }
    }))
}

/// GET /health - checks the database answers through the tunnel
pub async fn health(State(state): State<AppState>) -> ApiResponse<Value> {
    let now = chrono::Utc::now();

    match state.summaries.ping().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok"
        })),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            ApiResponse::with_status(
                json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            )
            .with_message("database unavailable")
        }
    }
}
