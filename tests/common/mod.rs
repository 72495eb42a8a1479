use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use learner_summary_api::app::{app, AppState};
use learner_summary_api::config::{ApiConfig, SecurityConfig};
use learner_summary_api::services::SummaryService;
use learner_summary_api::testing::{sample_profile, InMemoryLearnerStore};

pub const SEEDED_USER: i64 = 2274978;

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<InMemoryLearnerStore>,
}

/// Learner with 3 completed courses, one category at 2/4 and a degree
pub fn seeded_store() -> InMemoryLearnerStore {
    InMemoryLearnerStore::new()
        .with_profile(sample_profile(SEEDED_USER))
        .with_degree(SEEDED_USER, "B1")
        .with_course(1, "閱讀")
        .with_course(2, "閱讀")
        .with_course(3, "閱讀")
        .with_course(4, "閱讀")
        .with_course(5, "文法")
        .with_completion(SEEDED_USER, 1)
        .with_completion(SEEDED_USER, 2)
        .with_completion(SEEDED_USER, 5)
}

/// Serve the router over the given store on a free local port
pub async fn spawn_server(store: InMemoryLearnerStore) -> Result<TestServer> {
    let store = Arc::new(store);
    let state = AppState::new(SummaryService::new(store.clone()));
    let api = ApiConfig {
        port: 0,
        enable_request_logging: false,
    };
    let security = SecurityConfig {
        cors_origins: Vec::new(),
    };
    let router = app(state, &api, &security);

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let server = TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        store,
    };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}

impl TestServer {
    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if client.get(&self.base_url).send().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
