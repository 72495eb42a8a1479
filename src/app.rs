use std::sync::Arc;

use axum::{http::HeaderValue, http::Method, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ApiConfig, AppConfig, SecurityConfig};
use crate::database::{ConnectionManager, DatabaseManager, MySqlLearnerStore, TunneledConnector};
use crate::handlers;
use crate::services::SummaryService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub summaries: SummaryService,
}

impl AppState {
    pub fn new(summaries: SummaryService) -> Self {
        Self { summaries }
    }
}

pub fn app(state: AppState, api: &ApiConfig, security: &SecurityConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(mdl_user_routes());

    let cors = cors_layer(security);
    let router = if api.enable_request_logging {
        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
    } else {
        router.layer(cors)
    };

    router.with_state(state)
}

fn mdl_user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/mdl_user", get(handlers::mdl_user_list))
        .route("/api/chat/mdl_user/:user_id", get(handlers::mdl_user_get))
        .route(
            "/api/chat/mdl_user/:user_id/profile",
            get(handlers::mdl_user_profile_get),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins = &security.cors_origins;
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET])
}

/// Service graph for a loaded configuration; nothing connects until first use
pub fn build_state(config: &AppConfig) -> (AppState, Arc<DatabaseManager>) {
    let connector = TunneledConnector::new(config.ssh.clone(), config.database.clone());
    let manager = Arc::new(ConnectionManager::new(connector));
    let store = MySqlLearnerStore::new(manager.clone(), &config.database);
    let state = AppState::new(SummaryService::new(Arc::new(store)));
    (state, manager)
}
