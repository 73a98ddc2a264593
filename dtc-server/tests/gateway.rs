// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! End-to-end tests against a fake generation backend on an ephemeral port.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dtc_core::Project;
use dtc_server::{api::AppState, build_router, config::GatewayConfig};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn fake_txt2img(Json(request): Json<Value>) -> Response {
    let prompt = request["prompt"].as_str().unwrap_or_default().to_string();
    match prompt.as_str() {
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        "fail" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "sampler exploded").into_response();
        }
        _ => {}
    }

    let count = request["batch_size"].as_u64().unwrap_or(1);
    let images: Vec<String> = (0..count)
        .map(|i| {
            let png = format!("\u{89}PNG {} tEXt{{\"seed\":{},\"steps\":4}}", prompt, 1000 + i);
            STANDARD.encode(png.as_bytes())
        })
        .collect();
    Json(json!({ "images": images, "parameters": request, "info": "{}" })).into_response()
}

async fn fake_parameters() -> Json<Value> {
    Json(json!({ "model": "sd_v1.5", "sampler": "DPM++ 2M" }))
}

async fn spawn_fake_backend() -> u16 {
    let app = Router::new()
        .route("/", any(fake_parameters))
        .route("/sdapi/v1/txt2img", post(fake_txt2img));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// A port on which nothing listens.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn gateway(dir: &Path, backend_port: u16, timeout_secs: u64) -> (AppState, Router) {
    let mut config = GatewayConfig::default();
    config.backend.port = backend_port;
    config.backend.request_timeout_secs = timeout_secs;
    config.storage.results_dir = dir.join("results");
    config.storage.web_dir = dir.join("web");
    std::fs::create_dir_all(&config.storage.results_dir).unwrap();

    let state = AppState::new(config).unwrap();
    let app = build_router(state.clone());
    (state, app)
}

fn generate(project: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json");
    if let Some(project) = project {
        builder = builder.header("project", project);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ids(records: &Value) -> Vec<u64> {
    records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ID"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_generate_records_batches() {
    let dir = TempDir::new().unwrap();
    let (state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    let response = app
        .clone()
        .oneshot(generate(Some("cats"), json!({ "prompt": "cat", "batch_size": 2 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(ids(&first), vec![1, 2]);
    assert_eq!(first[0]["taskData"]["prompt"], json!("cat"));
    assert_eq!(first[0]["seed"], json!(1000));
    assert_eq!(first[1]["seed"], json!(1001));
    assert!(first[1]["imageName"].as_str().unwrap().starts_with("00002.png?"));

    let response = app
        .clone()
        .oneshot(generate(Some("cats"), json!({ "prompt": "cat", "batch_size": 3 })))
        .await
        .unwrap();
    let second = json_body(response).await;
    assert_eq!(ids(&second), vec![3, 4, 5]);

    for id in 1..=5 {
        let path = dir.path().join(format!("results/cats/{:05}.png", id));
        assert!(path.exists(), "missing {:?}", path);
    }
    let cats = Project::new("cats").unwrap();
    assert_eq!(state.ledger.history(&cats).len(), 5);
    assert!(state.ledger.history(&Project::global()).is_empty());
}

#[tokio::test]
async fn test_parameters_pass_through() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    let response = app
        .oneshot(Request::builder().uri("/parameters").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "model": "sd_v1.5", "sampler": "DPM++ 2M" })
    );
}

#[tokio::test]
async fn test_backend_down_is_503() {
    let dir = TempDir::new().unwrap();
    let (state, app) = gateway(dir.path(), closed_port().await, 30);

    let response = app
        .oneshot(generate(None, json!({ "prompt": "cat" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(response).await["error"].is_string());
    assert!(state.ledger.history(&Project::global()).is_empty());
}

#[tokio::test]
async fn test_slow_backend_is_504() {
    let dir = TempDir::new().unwrap();
    let (state, app) = gateway(dir.path(), spawn_fake_backend().await, 1);

    let response = app
        .oneshot(generate(None, json!({ "prompt": "slow" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(state.ledger.history(&Project::global()).is_empty());
}

#[tokio::test]
async fn test_backend_error_status_relayed() {
    let dir = TempDir::new().unwrap();
    let (state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    let response = app
        .oneshot(generate(None, json!({ "prompt": "fail" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"sampler exploded");
    assert!(state.ledger.history(&Project::global()).is_empty());
    assert!(!dir.path().join("results/history.json").exists());
}

#[tokio::test]
async fn test_invalid_project_rejected() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    let response = app
        .oneshot(generate(Some("a/b"), json!({ "prompt": "cat" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!dir.path().join("results/a").exists());
}

#[tokio::test]
async fn test_clear_then_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let (_state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    app.clone()
        .oneshot(generate(None, json!({ "prompt": "cat", "batch_size": 2 })))
        .await
        .unwrap();
    assert!(dir.path().join("results/00001.png").exists());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clear-history")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!dir.path().join("results/00001.png").exists());

    let response = app
        .oneshot(Request::builder().uri("/get-history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_remove_and_generate() {
    let dir = TempDir::new().unwrap();
    let (state, app) = gateway(dir.path(), spawn_fake_backend().await, 30);

    let response = app
        .clone()
        .oneshot(generate(Some("race"), json!({ "prompt": "seed", "batch_size": 9 })))
        .await
        .unwrap();
    assert_eq!(ids(&json_body(response).await), (1..=9).collect::<Vec<_>>());

    let mut tasks = Vec::new();
    for id in [2u64, 4, 6, 8] {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::builder()
                .method("POST")
                .uri("/remove-gen")
                .header("project", "race")
                .body(Body::from(id.to_string()))
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }));
    }
    for _ in 0..3 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            app.oneshot(generate(Some("race"), json!({ "prompt": "more" })))
                .await
                .unwrap()
                .status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let race = Project::new("race").unwrap();
    let mut remaining: Vec<u64> = state.ledger.history(&race).iter().map(|r| r.id).collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![1, 3, 5, 7, 9, 10, 11, 12]);

    for id in &remaining {
        assert!(dir.path().join(format!("results/race/{:05}.png", id)).exists());
    }
    for id in [2, 4, 6, 8] {
        assert!(!dir.path().join(format!("results/race/{:05}.png", id)).exists());
    }
}
