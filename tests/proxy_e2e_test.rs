// SPDX-License-Identifier: EUPL-1.2

//! End-to-end: a real guardian gateway in front of a mock "upstream"
//! LLM server. Confirms the full round trip — the upstream only ever
//! sees a token, the caller only ever sees plaintext.

use axum::routing::post;
use axum::{Json, Router};
use privacyguardian::config::Config;
use privacyguardian::gateway::run_gateway;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;

async fn spawn_mock_upstream() -> SocketAddr {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            // The mock upstream never receives plaintext: echo whatever
            // string it was handed straight back in the response shape.
            let content = body["messages"][0]["content"].clone();
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_guardian() -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.listen = "127.0.0.1:0".parse().unwrap();
    config.data_dir = dir.path().to_path_buf();
    std::fs::create_dir_all(&config.data_dir).unwrap();

    // run_gateway binds its own listener; to discover the ephemeral port
    // without threading it back out, bind here first and hand the exact
    // address to run_gateway instead of "port 0" twice.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);
    config.listen = addr;

    tokio::spawn(run_gateway(config));
    // give the listener a moment to bind
    tokio::time::sleep(Duration::from_millis(200)).await;
    (addr, dir)
}

#[tokio::test]
async fn upstream_never_sees_plaintext_and_caller_gets_it_back() {
    let upstream_addr = spawn_mock_upstream().await;
    let (guardian_addr, _dir) = spawn_guardian().await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{guardian_addr}/v1/chat/completions"))
        .header("x-target-url", format!("http://{upstream_addr}"))
        .json(&json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "my email is jane.doe@example.com"}]
        }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    let content = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(content.contains("jane.doe@example.com"), "client should see plaintext: {content}");
    assert!(!content.contains("◈PG:"), "client should never see a raw token: {content}");
}

#[tokio::test]
async fn guardian_control_surface_reports_health() {
    let (guardian_addr, _dir) = spawn_guardian().await;
    let response = reqwest::get(format!("http://{guardian_addr}/__guardian__/health"))
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn unreachable_upstream_yields_bad_gateway() {
    let (guardian_addr, _dir) = spawn_guardian().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{guardian_addr}/v1/chat/completions"))
        .header("x-target-url", "http://127.0.0.1:1")
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
}
