// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

#![allow(dead_code)]

use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wa_rest_server::mock_dependencies::MockServerDependencies;
use wa_rest_server::platform::{SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions};
use wa_rest_server::state::AppState;
use wa_rest_server::{PairingConfig, Server, ServerConfig};

pub const API_KEY: &str = "test-key";

/// Timings scaled down so scenarios finish in well under a second each
pub fn fast_pairing() -> PairingConfig {
    PairingConfig {
        qr_code_wait: Duration::from_millis(500),
        qr_attempt_deadline: Duration::from_secs(5),
        phone_pair_timeout: Duration::from_secs(2),
        auth_wait_deadline: Duration::from_secs(3),
        auth_poll_interval: Duration::from_millis(50),
        logout_timeout: Duration::from_secs(2),
        ..PairingConfig::default()
    }
}

pub struct TestServer {
    pub base_url: String,
    pub platform: SimulatedPlatform,
    pub state: AppState,
    client: Client,
    _store: tempfile::TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(options: SimulationOptions) -> Self {
        Self::start_with(options, fast_pairing()).await
    }

    pub async fn start_with(options: SimulationOptions, pairing: PairingConfig) -> Self {
        let factory = SimulatedPlatformFactory::new(SimulatedPlatform::new(options));
        Self::start_with_factory(factory, pairing).await
    }

    pub async fn start_with_factory(factory: SimulatedPlatformFactory, pairing: PairingConfig) -> Self {
        let store = tempfile::tempdir().expect("temp store dir");
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            api_keys: vec![API_KEY.to_string(), "second-key".to_string()],
            store_dir: store.path().to_path_buf(),
            pairing,
            ..Default::default()
        };

        let deps = MockServerDependencies::with_factory(config.clone(), factory);
        let platform = deps.platform();
        let state = deps.into_state();
        let server = Server::with_state(config, state.clone()).await.expect("server");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
                .expect("server run");
        });

        Self {
            base_url: format!("http://{}", addr),
            platform,
            state,
            client: Client::new(),
            _store: store,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request against `/api/v1` carrying the test API key
    pub fn api(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(&format!("/api/v1{}", path)))
            .header("X-API-Key", API_KEY)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.api(reqwest::Method::GET, path).send().await.expect("request")
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Response {
        self.api(reqwest::Method::POST, path)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    pub fn raw(&self) -> &Client {
        &self.client
    }

    /// Trigger graceful shutdown and wait for the server to stop
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.expect("server task");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub async fn json(response: Response) -> serde_json::Value {
    response.json().await.expect("json body")
}
