//! Shared integration-test harness: an in-process `XorOJ` backend on a
//! random local port, plus helpers for running the `xoroj` binary.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::task::JoinHandle;

/// Token the mock backend accepts.
pub const TOKEN: &str = "test-token";

/// Mutable backend state shared with the route handlers.
pub struct MockState {
    pub contest_id: u64,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub registered: AtomicBool,
    pub register_calls: AtomicUsize,
    /// `Some(message)` makes `/register` answer `success: false`; an
    /// empty message is omitted from the body.
    pub reject: Mutex<Option<String>>,
    /// Delay applied to every request.
    pub delay: Mutex<Option<Duration>>,
    /// Clock offset reported by the standings snapshot.
    pub server_offset: chrono::TimeDelta,
}

impl MockState {
    pub fn new(contest_id: u64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            contest_id,
            title: format!("Round {contest_id}"),
            start,
            end,
            registered: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            reject: Mutex::new(None),
            delay: Mutex::new(None),
            server_offset: chrono::TimeDelta::zero(),
        }
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn reject_with(&self, message: &str) {
        *self.reject.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {TOKEN}"))
    }
}

/// A running mock backend. The server task is aborted on drop.
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockBackend {
    /// Binds `127.0.0.1:0` and serves the contest routes.
    pub async fn spawn(state: MockState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/api/contests/{id}", get(contest))
            .route("/api/contests/{id}/is-registered", get(is_registered))
            .route("/api/contests/{id}/register", post(register))
            .route("/api/standings/contests/{id}", get(standings))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mock backend");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Writes a client config pointing at this backend.
    pub fn write_config(&self, dir: &Path, token: Option<&str>) -> std::path::PathBuf {
        let path = dir.join("xoroj.yaml");
        let mut yaml = format!("api:\n  base_url: \"{}\"\n  timeout: 2s\n", self.base_url);
        if let Some(token) = token {
            yaml.push_str(&format!("  token: \"{token}\"\n"));
        }
        yaml.push_str("controller:\n  skew_margin: 20ms\n");
        std::fs::write(&path, yaml).expect("write config");
        path
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Contest not found").into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Invalid token" })),
    )
        .into_response()
}

async fn contest(State(s): State<Arc<MockState>>, UrlPath(id): UrlPath<u64>) -> Response {
    s.pause().await;
    if id != s.contest_id {
        return not_found();
    }
    Json(json!({
        "id": s.contest_id,
        "title": s.title,
        "description": "Mock contest",
        // zone-less, as the backend's LocalDateTime serializes
        "startTime": s.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "endTime": s.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "duration": (s.end - s.start).num_minutes(),
        "format": "ICPC",
        "visibility": "PUBLIC",
        "allowRegistration": true
    }))
    .into_response()
}

async fn is_registered(
    State(s): State<Arc<MockState>>,
    UrlPath(id): UrlPath<u64>,
    headers: HeaderMap,
) -> Response {
    s.pause().await;
    if !MockState::authorized(&headers) {
        return unauthorized();
    }
    if id != s.contest_id {
        return not_found();
    }
    Json(json!({ "registered": s.registered.load(Ordering::SeqCst) })).into_response()
}

async fn register(
    State(s): State<Arc<MockState>>,
    UrlPath(id): UrlPath<u64>,
    headers: HeaderMap,
) -> Response {
    s.register_calls.fetch_add(1, Ordering::SeqCst);
    s.pause().await;
    if !MockState::authorized(&headers) {
        return unauthorized();
    }
    if id != s.contest_id {
        return not_found();
    }
    let reject = s.reject.lock().unwrap().clone();
    match reject {
        Some(message) if message.is_empty() => Json(json!({ "success": false })).into_response(),
        Some(message) => Json(json!({ "success": false, "message": message })).into_response(),
        None => {
            s.registered.store(true, Ordering::SeqCst);
            Json(json!({ "success": true, "message": "Registered successfully" })).into_response()
        }
    }
}

async fn standings(State(s): State<Arc<MockState>>, UrlPath(id): UrlPath<u64>) -> Response {
    s.pause().await;
    if id != s.contest_id {
        return not_found();
    }
    let now = Utc::now() + s.server_offset;
    let status = if now < s.start {
        "UPCOMING"
    } else if now < s.end {
        "RUNNING"
    } else {
        "ENDED"
    };
    Json(json!({
        "contestId": s.contest_id,
        "version": 1,
        "problemIds": [],
        "rows": [],
        "startEpochMs": s.start.timestamp_millis(),
        "endEpochMs": s.end.timestamp_millis(),
        "nowEpochMs": now.timestamp_millis(),
        "status": status
    }))
    .into_response()
}

/// Builds a `Command` for the `xoroj` binary with `XOROJ_*` overrides
/// cleared so the host environment cannot leak into tests.
pub fn xoroj_command() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(env!("CARGO_BIN_EXE_xoroj"));
    for var in [
        "XOROJ_API_URL",
        "XOROJ_TOKEN",
        "XOROJ_SKEW_MARGIN_MS",
        "XOROJ_CONFIG",
        "XOROJ_LOG_LEVEL",
        "XOROJ_METRICS_PORT",
    ] {
        cmd.env_remove(var);
    }
    cmd.kill_on_drop(true);
    cmd
}

/// Runs the binary to completion with a generous timeout.
pub async fn run_xoroj(args: &[&str]) -> std::process::Output {
    run_xoroj_with_env(args, &[]).await
}

/// Like [`run_xoroj`], with extra environment variables set.
pub async fn run_xoroj_with_env(args: &[&str], envs: &[(&str, &str)]) -> std::process::Output {
    let mut cmd = xoroj_command();
    cmd.args(args).envs(envs.iter().copied());
    tokio::time::timeout(Duration::from_secs(20), cmd.output())
        .await
        .expect("xoroj timed out")
        .expect("failed to run xoroj")
}
