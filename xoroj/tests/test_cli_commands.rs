mod common;

use chrono::{TimeDelta, Utc};
use common::{MockBackend, MockState, TOKEN, run_xoroj, run_xoroj_with_env};

#[tokio::test]
async fn phase_json_output() {
    let output = run_xoroj(&[
        "phase",
        "--start",
        "2025-01-01T10:00:00Z",
        "--end",
        "2025-01-01T12:00:00Z",
        "--at",
        "2025-01-01T11:00:00Z",
        "--registered",
        "--format",
        "json",
    ])
    .await;
    assert!(
        output.status.success(),
        "phase should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    assert_eq!(report["phase"], "RUNNING");
    assert_eq!(report["gate"]["can_enter"], true);
    assert_eq!(report["gate"]["can_register"], false);
    assert_eq!(report["countdown"], "Contest Started!");
}

#[tokio::test]
async fn phase_human_output() {
    let output = run_xoroj(&[
        "phase",
        "--start",
        "2025-01-01T10:00:00",
        "--end",
        "2025-01-01T12:00:00",
        "--at",
        "2025-01-01T09:59:59",
    ])
    .await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("UPCOMING"), "{stdout}");
    assert!(stdout.contains("0h 0m 1s"), "{stdout}");
}

#[tokio::test]
async fn phase_inverted_window_exits_with_window_code() {
    let output = run_xoroj(&[
        "phase",
        "--start",
        "2025-01-01T12:00:00Z",
        "--end",
        "2025-01-01T10:00:00Z",
    ])
    .await;
    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid contest window"));
}

#[tokio::test]
async fn phase_rejects_bad_timestamp() {
    let output = run_xoroj(&["phase", "--start", "soon", "--end", "later"]).await;
    assert_eq!(output.status.code(), Some(64));
}

#[tokio::test]
async fn version_json() {
    let output = run_xoroj(&["version", "--format", "json"]).await;
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "xoroj");
    assert_eq!(parsed["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn completions_bash() {
    let output = run_xoroj(&["completions", "bash"]).await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("xoroj"));
}

#[tokio::test]
async fn register_against_backend() {
    let now = Utc::now();
    let backend = MockBackend::spawn(MockState::new(
        3,
        now + TimeDelta::hours(1),
        now + TimeDelta::hours(3),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = backend.write_config(dir.path(), Some(TOKEN));

    let output = run_xoroj(&["register", "3", "--config", config.to_str().unwrap()]).await;
    assert!(
        output.status.success(),
        "register should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("registered for contest 3"));
    assert_eq!(backend.state.register_calls(), 1);

    // second run sees the registration and sends nothing
    let output = run_xoroj(&["register", "3", "--config", config.to_str().unwrap()]).await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("already registered"));
    assert_eq!(backend.state.register_calls(), 1);
}

#[tokio::test]
async fn register_rejection_exits_with_registration_code() {
    let now = Utc::now();
    let backend = MockBackend::spawn(MockState::new(
        4,
        now + TimeDelta::hours(1),
        now + TimeDelta::hours(3),
    ))
    .await;
    backend.state.reject_with("Registration closed");
    let dir = tempfile::tempdir().unwrap();
    let config = backend.write_config(dir.path(), Some(TOKEN));

    let output = run_xoroj(&["register", "4", "--config", config.to_str().unwrap()]).await;
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Registration closed"));
}

#[tokio::test]
async fn register_after_end_sends_nothing() {
    let now = Utc::now();
    let backend = MockBackend::spawn(MockState::new(
        5,
        now - TimeDelta::hours(3),
        now - TimeDelta::hours(1),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = backend.write_config(dir.path(), Some(TOKEN));

    let output = run_xoroj(&["register", "5", "--config", config.to_str().unwrap()]).await;
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("contest has ended"));
    assert_eq!(backend.state.register_calls(), 0);
}

#[tokio::test]
async fn unreachable_backend_exits_with_api_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("xoroj.yaml");
    std::fs::write(&config, "api:\n  base_url: http://127.0.0.1:9\n  timeout: 1s\n").unwrap();

    let output = run_xoroj(&["register", "1", "--config", config.to_str().unwrap()]).await;
    assert_eq!(output.status.code(), Some(4));
}

#[tokio::test]
async fn watch_follows_contest_to_the_end() {
    // whole seconds keep the zone-less wire format exact
    let now = Utc::now();
    let base = now - TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    let backend = MockBackend::spawn(MockState::new(
        6,
        base - TimeDelta::seconds(5),
        base + TimeDelta::seconds(2),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = backend.write_config(dir.path(), None);
    let events = dir.path().join("events.jsonl");

    let output = run_xoroj(&[
        "watch",
        "6",
        "--config",
        config.to_str().unwrap(),
        "--events",
        events.to_str().unwrap(),
    ])
    .await;
    assert!(
        output.status.success(),
        "watch should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[0].contains("RUNNING"));
    assert!(lines[1].contains("ENDED"));

    let kinds: Vec<String> = std::fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].to_string())
        .collect();
    assert_eq!(
        kinds,
        [
            "\"ControllerCreated\"",
            "\"BoundaryReached\"",
            "\"ControllerDisposed\""
        ]
    );
}

#[tokio::test]
async fn watch_on_server_clock_of_ended_contest() {
    let now = Utc::now();
    let mut state = MockState::new(7, now - TimeDelta::hours(2), now + TimeDelta::minutes(30));
    // server is an hour ahead: the contest is already over there
    state.server_offset = TimeDelta::hours(1);
    let backend = MockBackend::spawn(state).await;
    let dir = tempfile::tempdir().unwrap();
    let config = backend.write_config(dir.path(), None);

    let output = run_xoroj(&[
        "watch",
        "7",
        "--server-clock",
        "--config",
        config.to_str().unwrap(),
    ])
    .await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "{stdout}");
    assert!(stdout.contains("ENDED"));
}

#[tokio::test]
async fn env_overrides_point_register_at_backend() {
    let now = Utc::now();
    let backend = MockBackend::spawn(MockState::new(
        8,
        now + TimeDelta::hours(1),
        now + TimeDelta::hours(3),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("xoroj.yaml");
    std::fs::write(&config, "api:\n  base_url: http://127.0.0.1:9\n  timeout: 2s\n").unwrap();

    let output = run_xoroj_with_env(
        &["register", "8", "--config", config.to_str().unwrap()],
        &[("XOROJ_API_URL", &backend.base_url), ("XOROJ_TOKEN", TOKEN)],
    )
    .await;
    assert!(
        output.status.success(),
        "register should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    // the mock only accepts the bearer token, so both overrides arrived
    assert_eq!(backend.state.register_calls(), 1);
    assert!(backend.state.registered.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn empty_token_means_no_token() {
    let now = Utc::now();
    let backend = MockBackend::spawn(MockState::new(
        9,
        now + TimeDelta::hours(1),
        now + TimeDelta::hours(3),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("xoroj.yaml");
    std::fs::write(
        &config,
        format!(
            "api:\n  base_url: \"{}\"\n  timeout: 2s\n  token: \"${{XOROJ_TOKEN:-}}\"\n",
            backend.base_url
        ),
    )
    .unwrap();

    let output = run_xoroj_with_env(
        &["register", "9", "--config", config.to_str().unwrap()],
        &[("XOROJ_TOKEN", "")],
    )
    .await;
    // without a token the is-registered lookup is skipped and the
    // unauthenticated submission is refused by the backend
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid token"));
    assert_eq!(backend.state.register_calls(), 1);
}

#[tokio::test]
async fn malformed_skew_margin_env_is_a_config_error() {
    let output = run_xoroj_with_env(&["register", "1"], &[("XOROJ_SKEW_MARGIN_MS", "abc")]).await;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("XOROJ_SKEW_MARGIN_MS"), "{stderr}");
    assert!(stderr.contains("abc"), "{stderr}");
}

#[tokio::test]
async fn oversized_skew_margin_env_fails_validation() {
    let output = run_xoroj_with_env(&["register", "1"], &[("XOROJ_SKEW_MARGIN_MS", "5000")]).await;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("controller.skew_margin"), "{stderr}");
}
