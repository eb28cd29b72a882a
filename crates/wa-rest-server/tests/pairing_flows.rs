// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! QR and phone pairing, waiting and logout over HTTP

mod common;

use common::{TestServer, fast_pairing, json};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use wa_rest_server::platform::{SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions};

fn paired() -> SimulationOptions {
    SimulationOptions {
        logged_in: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn qr_code_arrives_within_the_wait() {
    let server = TestServer::start(SimulationOptions {
        code_delay: Duration::from_millis(100),
        ..Default::default()
    })
    .await;

    let response = server.get("/auth/qr").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["qr_code"], "2@simulated-ref-0");
    assert!(body["qr_code_png"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(body["expires_in"], 60);
    assert!(body["instructions"].as_str().unwrap().contains("Linked Devices"));
}

#[tokio::test]
async fn qr_while_authenticated_is_a_conflict() {
    let server = TestServer::start(paired()).await;

    let response = server.get("/auth/qr").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(server.platform.connect_calls(), 0);
}

#[tokio::test]
async fn late_code_times_out_then_wait_succeeds() {
    let server = TestServer::start(SimulationOptions {
        code_delay: Duration::from_millis(900),
        scan_after: Some(Duration::from_millis(200)),
        ..Default::default()
    })
    .await;

    let response = server.get("/auth/qr").await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    let waited = server.get("/auth/wait").await;
    assert_eq!(waited.status(), StatusCode::OK);
    let body = json(waited).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["message"], "pairing successful");

    let status = json(server.get("/auth/status").await).await;
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["connected"], true);
}

#[tokio::test]
async fn wait_returns_immediately_when_authenticated() {
    let server = TestServer::start(paired()).await;

    let started = std::time::Instant::now();
    let body = json(server.get("/auth/wait").await).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["message"], "already authenticated");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn wait_times_out_with_unauthenticated_body() {
    let server = TestServer::start_with(
        SimulationOptions::default(),
        wa_rest_server::PairingConfig {
            auth_wait_deadline: Duration::from_millis(300),
            ..fast_pairing()
        },
    )
    .await;

    let response = server.get("/auth/wait").await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json(response).await["authenticated"], false);
}

#[tokio::test]
async fn concurrent_qr_requests_share_one_connect() {
    let server = TestServer::start(SimulationOptions {
        code_delay: Duration::from_millis(200),
        ..Default::default()
    })
    .await;

    let (first, second) = tokio::join!(server.get("/auth/qr"), server.get("/auth/qr"));
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let first = json(first).await;
    let second = json(second).await;
    assert_eq!(first["qr_code"], second["qr_code"]);
    assert_eq!(server.platform.connect_calls(), 1);
}

#[tokio::test]
async fn background_connect_failure_is_reported() {
    let server = TestServer::start(SimulationOptions {
        connect_error: Some("bridge unreachable".to_string()),
        ..Default::default()
    })
    .await;

    let response = server.get("/auth/qr").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("bridge unreachable"));
}

#[tokio::test]
async fn unreadable_store_is_an_initialization_error() {
    let factory = SimulatedPlatformFactory::failing(
        SimulatedPlatform::new(SimulationOptions::default()),
        "corrupt credential store",
    );
    let server = TestServer::start_with_factory(factory, fast_pairing()).await;

    for path in ["/auth/qr", "/auth/wait"] {
        let response = server.get(path).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{path}");
        let body = json(response).await;
        assert_eq!(body["title"], "Client Initialization Failed");
    }

    let status = json(server.get("/auth/status").await).await;
    assert_eq!(status["authenticated"], false);
}

#[tokio::test]
async fn shutdown_stops_an_in_flight_attempt() {
    let mut server = TestServer::start(SimulationOptions {
        code_delay: Duration::from_secs(30),
        ..Default::default()
    })
    .await;

    assert_eq!(server.get("/auth/qr").await.status(), StatusCode::REQUEST_TIMEOUT);
    let pairing = server.state.pairing.clone();
    assert!(pairing.has_attempt_in_flight().await);

    server.stop().await;
    tokio::time::timeout(Duration::from_secs(1), async {
        while pairing.has_attempt_in_flight().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("attempt should stop once the session closes");
}

#[tokio::test]
async fn phone_pairing_returns_a_code() {
    let server = TestServer::start(SimulationOptions::default()).await;

    let response = server
        .post_json("/auth/pair", json!({"phone_number": "+49 151 1234 5678"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["pairing_code"], "ABCD-EFGH");
    assert_eq!(body["phone_number"], "+49 151 1234 5678");
    assert_eq!(body["expires_in"], 300);
    assert_eq!(server.platform.connect_calls(), 1);
}

#[tokio::test]
async fn qr_pairing_after_a_phone_code() {
    let server = TestServer::start(SimulationOptions {
        code_delay: Duration::from_millis(100),
        ..Default::default()
    })
    .await;

    let response = server
        .post_json("/auth/pair", json!({"phone_number": "15550109999"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.get("/auth/qr").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["qr_code"], "2@simulated-ref-0");
    assert_eq!(server.platform.connect_calls(), 1);
}

#[tokio::test]
async fn bad_phone_requests_never_reach_the_platform() {
    let server = TestServer::start(SimulationOptions::default()).await;

    for body in [
        json!({"phone_number": ""}),
        json!({"phone_number": "call me"}),
        json!({"phone_number": "12345"}),
        json!({}),
        json!({"phone_number": 15550109999u64}),
    ] {
        let response = server.post_json("/auth/pair", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let garbage = server
        .api(reqwest::Method::POST, "/auth/pair")
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

    assert_eq!(server.platform.connect_calls(), 0);
    assert_eq!(server.platform.counters().pair_phone.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn phone_pairing_while_authenticated_is_a_conflict() {
    let server = TestServer::start(paired()).await;

    let response = server
        .post_json("/auth/pair", json!({"phone_number": "15550109999"}))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_requires_authentication() {
    let server = TestServer::start(SimulationOptions::default()).await;

    let response = server.post_json("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.platform.connect_calls(), 0);
    assert_eq!(server.platform.counters().logout.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn logout_unlinks_the_device() {
    let server = TestServer::start(paired()).await;

    let response = server.post_json("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["logged_out"], true);
    assert_eq!(body["message"], "successfully logged out");

    let status = json(server.get("/auth/status").await).await;
    assert_eq!(status["authenticated"], false);
}
