#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use slidecast_api::config::ServerConfig;
use slidecast_api::engine::JobDispatcher;
use slidecast_api::router::build_app_router;
use slidecast_api::state::AppState;
use slidecast_api::ws::WsManager;
use slidecast_events::{EventBus, JobRegistry};
use slidecast_pipeline::{builtin, PipelineConfig, PipelineRunner};

/// A fully wired application plus the state behind it.
///
/// Holds the output directory so it lives as long as the app.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _output: TempDir,
}

impl TestApp {
    /// A fresh clone of the router, ready for `oneshot`.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Pipelines run with dry-run collaborators so no network, image or
/// ffmpeg work happens; `delay` is applied to every collaborator call.
pub fn test_config(output_dir: &TempDir, delay: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        pipeline: PipelineConfig {
            output_dir: output_dir.path().to_path_buf(),
            dry_run: true,
            dry_run_delay: delay,
            ..PipelineConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Build the full application router with instant dry-run pipelines.
pub fn build_test_app() -> TestApp {
    build_test_app_with_delay(Duration::ZERO)
}

/// Build the full application router whose pipelines pause for `delay`
/// inside every collaborator call.
///
/// Uses the same `build_app_router` as `main.rs` so integration tests
/// exercise the production middleware stack.
pub fn build_test_app_with_delay(delay: Duration) -> TestApp {
    let output = tempfile::tempdir().unwrap();
    build_test_app_from(test_config(&output, delay), output)
}

pub fn build_test_app_from(config: ServerConfig, output: TempDir) -> TestApp {
    let registry = Arc::new(JobRegistry::new(config.backlog_retention));
    let bus = EventBus::new(registry, config.observer_queue_capacity);
    let collaborators = builtin::collaborators(&config.pipeline).unwrap();
    let runner = PipelineRunner::new(Arc::new(collaborators), &config.pipeline);

    let state = AppState {
        config: Arc::new(config.clone()),
        bus: bus.clone(),
        dispatcher: Arc::new(JobDispatcher::new(bus, runner)),
        ws_manager: Arc::new(WsManager::new()),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        _output: output,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Job helpers
// ---------------------------------------------------------------------------

/// Create a job and return its id as sent by the API.
pub async fn create_job(app: Router, body: serde_json::Value) -> String {
    let response = post_json(app, "/api/v1/jobs", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["job_id"].as_str().unwrap().to_string()
}

/// Poll the job until its status is terminal and return the snapshot.
pub async fn wait_for_terminal(app: Router, job_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/jobs/{job_id}");
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &uri).await).await;
        let status = json["data"]["status"].as_str().unwrap_or_default();
        if matches!(status, "succeeded" | "failed" | "cancelled") {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish in time");
}
