//! Runs the built binary against a local Helix stand-in and checks its
//! exit status.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::process::Output;
use std::sync::{Arc, Mutex};
use tokio::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_will-it-blend");

#[derive(Default)]
struct Helix {
    unauthorized: bool,
    resolved_with: Mutex<Vec<String>>,
}

fn prediction(status: &str) -> Value {
    json!({
        "data": [{
            "id": "pred-1",
            "broadcaster_id": "1234",
            "title": "t",
            "outcomes": [{"id": "S", "title": "Yes"}, {"id": "F", "title": "No"}],
            "prediction_window": 1,
            "status": status,
            "created_at": "2026-01-01T00:00:00Z"
        }]
    })
}

async fn users(State(helix): State<Arc<Helix>>) -> (StatusCode, Json<Value>) {
    if helix.unauthorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": 401, "message": "Invalid OAuth token"})),
        );
    }
    (StatusCode::OK, Json(json!({"data": [{"id": "1234", "login": "streamer"}]})))
}

async fn resolve(State(helix): State<Arc<Helix>>, Json(body): Json<Value>) -> Json<Value> {
    let winner = body["winning_outcome_id"].as_str().unwrap_or_default().to_string();
    helix.resolved_with.lock().unwrap().push(winner);
    Json(prediction("RESOLVED"))
}

async fn spawn_helix(helix: Arc<Helix>) -> String {
    let router = Router::new()
        .route("/users", get(users))
        .route(
            "/predictions",
            get(|| async { Json(prediction("LOCKED")) })
                .post(|| async { Json(prediction("ACTIVE")) })
                .patch(resolve),
        )
        .with_state(helix);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn run_cli(base_url: &str, command: &str) -> Output {
    let missing_config = std::env::temp_dir().join("will-it-blend-cli-test-missing.toml");
    let mut cmd = Command::new(BIN);
    for var in [
        "WILL_IT_BLEND_CONFIG",
        "WILL_IT_BLEND_TITLE",
        "WILL_IT_BLEND_DURATION",
        "WILL_IT_BLEND_SUCCESS",
        "WILL_IT_BLEND_FAILURE",
        "WILL_IT_BLEND_PORT",
        "WILL_IT_BLEND_TOKEN",
        "WILL_IT_BLEND_CLIENT_ID",
        "WILL_IT_BLEND_API_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd.args(["--token", "T", "--client-id", "test-client", "--duration", "1"])
        .arg("--api-base-url")
        .arg(base_url)
        .arg("--config")
        .arg(&missing_config)
        .arg(command)
        .output()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cli_exits_zero_when_resolved() {
    let helix = Arc::new(Helix::default());
    let base_url = spawn_helix(helix.clone()).await;

    let output = run_cli(&base_url, "true").await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(*helix.resolved_with.lock().unwrap(), vec!["S".to_string()]);
}

#[tokio::test]
async fn test_cli_failing_command_still_resolves() {
    let helix = Arc::new(Helix::default());
    let base_url = spawn_helix(helix.clone()).await;

    let output = run_cli(&base_url, "false").await;

    assert!(output.status.success());
    assert_eq!(*helix.resolved_with.lock().unwrap(), vec!["F".to_string()]);
}

#[tokio::test]
async fn test_cli_exits_nonzero_on_rejected_token() {
    let helix = Arc::new(Helix {
        unauthorized: true,
        ..Helix::default()
    });
    let base_url = spawn_helix(helix.clone()).await;

    let output = run_cli(&base_url, "true").await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error getting user ID"), "stderr: {stderr}");
    assert!(helix.resolved_with.lock().unwrap().is_empty());
}

#[test]
fn test_cli_rejects_port_outside_whitelist() {
    let output = std::process::Command::new(BIN)
        .args(["--port", "9999", "true"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_version() {
    let output = std::process::Command::new(BIN).arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}
