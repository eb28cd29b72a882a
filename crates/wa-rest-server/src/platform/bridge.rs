// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Platform client backed by a bridge sidecar
//!
//! The bridge owns the messaging protocol. We drive it over plain HTTP and
//! follow its `/v1/events` Server-Sent Events stream for pairing progress and
//! connection state. `/v1/connect` only brings the transport up; a QR
//! handshake is started (or restarted) with `/v1/pair-qr`.

use super::credentials::{CredentialStore, DeviceCredentials};
use super::{PairingEvent, PlatformClient, PlatformClientFactory, PlatformError, TransportControl};
use async_trait::async_trait;
use chrono::Utc;
use eventsource_client::{Client, ClientBuilder, ReconnectOptions, SSE};
use futures::StreamExt;
use reqwest::{Client as HttpClient, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use url::Url;

const DEFAULT_CODE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    logged_in: bool,
}

#[derive(Debug, Serialize)]
struct PairPhoneRequest<'a> {
    phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct PairPhoneResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct QrEvent {
    code: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PairSuccessEvent {
    device_id: String,
    session_token: String,
    #[serde(default)]
    push_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairErrorEvent {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    #[serde(alias = "detail", alias = "message")]
    error: String,
}

/// State shared between the client and its event listener task
struct BridgeShared {
    store: CredentialStore,
    credentials: Mutex<Option<DeviceCredentials>>,
    connected: AtomicBool,
    logged_in: AtomicBool,
    subscribers: Mutex<Vec<mpsc::Sender<PairingEvent>>>,
    closed: AtomicBool,
}

impl BridgeShared {
    fn broadcast(&self, event: PairingEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("pairing subscriber lagging, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn drop_subscribers(&self) {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn session_token(&self) -> Option<String> {
        self.credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|c| c.session_token.clone())
    }

    async fn handle_event(&self, event_type: &str, data: &str) {
        match event_type {
            "qr" => match serde_json::from_str::<QrEvent>(data) {
                Ok(qr) => self.broadcast(PairingEvent::Code {
                    code: qr.code,
                    timeout: Duration::from_secs(
                        qr.timeout_secs.unwrap_or(DEFAULT_CODE_TIMEOUT_SECS),
                    ),
                }),
                Err(err) => tracing::warn!(error = %err, "malformed qr event from bridge"),
            },
            "pair-success" => match serde_json::from_str::<PairSuccessEvent>(data) {
                Ok(paired) => {
                    let credentials = DeviceCredentials {
                        device_id: paired.device_id,
                        session_token: paired.session_token,
                        push_name: paired.push_name,
                        paired_at: Utc::now(),
                    };
                    if let Err(err) = self.store.save(&credentials).await {
                        tracing::error!(error = %err, "failed to persist device credentials");
                        self.broadcast(PairingEvent::Error(err.to_string()));
                        return;
                    }
                    tracing::info!(device_id = %credentials.device_id, "device paired");
                    *self.credentials.lock().unwrap_or_else(|e| e.into_inner()) =
                        Some(credentials);
                    self.logged_in.store(true, Ordering::SeqCst);
                    self.broadcast(PairingEvent::Success);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "malformed pair-success event from bridge");
                    self.broadcast(PairingEvent::Error(format!("malformed pairing result: {}", err)));
                }
            },
            "pair-error" => {
                let reason = serde_json::from_str::<PairErrorEvent>(data)
                    .map(|e| e.reason)
                    .unwrap_or_else(|_| data.to_string());
                self.broadcast(PairingEvent::Error(reason));
            }
            "qr-timeout" => self.broadcast(PairingEvent::Timeout),
            "connected" => self.connected.store(true, Ordering::SeqCst),
            "disconnected" => {
                self.connected.store(false, Ordering::SeqCst);
                self.drop_subscribers();
            }
            "logged-out" => {
                tracing::warn!("bridge reported the device was logged out");
                self.forget_credentials().await;
            }
            other => tracing::trace!(event_type = other, "ignoring bridge event"),
        }
    }

    async fn forget_credentials(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
        *self.credentials.lock().unwrap_or_else(|e| e.into_inner()) = None;
        if let Err(err) = self.store.invalidate().await {
            tracing::error!(error = %err, "failed to remove device credentials");
        }
    }
}

/// `PlatformClient` speaking to the bridge sidecar
pub struct BridgeClient {
    http: HttpClient,
    base_url: Url,
    shared: Arc<BridgeShared>,
    connect_lock: AsyncMutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeClient {
    pub fn new(
        http: HttpClient,
        base_url: Url,
        store: CredentialStore,
        credentials: Option<DeviceCredentials>,
    ) -> Self {
        let logged_in = credentials.is_some();
        Self {
            http,
            base_url,
            shared: Arc::new(BridgeShared {
                store,
                credentials: Mutex::new(credentials),
                connected: AtomicBool::new(false),
                logged_in: AtomicBool::new(logged_in),
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            connect_lock: AsyncMutex::new(()),
            listener: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, PlatformError> {
        self.base_url
            .join(path)
            .map_err(|err| PlatformError::Transport(format!("invalid bridge url: {}", err)))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let response = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;

        if status.is_success() {
            let body = if text.trim().is_empty() { "null" } else { text.as_str() };
            return serde_json::from_str(body).map_err(|err| {
                PlatformError::Transport(format!("unexpected bridge response: {}", err))
            });
        }

        let message = serde_json::from_str::<BridgeErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        if status.is_server_error() {
            Err(PlatformError::Transport(format!("bridge returned {}: {}", status, message)))
        } else {
            Err(PlatformError::Rejected(message))
        }
    }

    fn start_listener(&self) -> Result<JoinHandle<()>, PlatformError> {
        let url = self.url("/v1/events")?;
        let client = ClientBuilder::for_url(url.as_str())
            .map_err(|err| PlatformError::Transport(err.to_string()))?
            .reconnect(ReconnectOptions::reconnect(false).build())
            .build();

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move {
            let mut stream = client.stream();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(SSE::Connected(_)) => {
                        tracing::debug!("bridge event stream opened");
                    }
                    Ok(SSE::Event(ev)) => {
                        shared.handle_event(&ev.event_type, &ev.data).await;
                    }
                    Ok(SSE::Comment(_)) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "bridge event stream failed");
                        break;
                    }
                }
            }
            shared.connected.store(false, Ordering::SeqCst);
            shared.drop_subscribers();
        }))
    }
}

#[async_trait]
impl TransportControl for BridgeClient {
    async fn ensure_transport_connected(&self) -> Result<(), PlatformError> {
        let _guard = self.connect_lock.lock().await;
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(PlatformError::Closed);
        }
        if self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Listen first so the first code is not lost
        let listener = self.start_listener()?;
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(listener)
        {
            previous.abort();
        }

        let token = self.shared.session_token();
        let response: ConnectResponse = self
            .post(
                "/v1/connect",
                &ConnectRequest {
                    session_token: token.as_deref(),
                },
            )
            .await?;

        if token.is_some() && !response.logged_in {
            tracing::warn!("bridge no longer accepts the stored session");
            self.shared.forget_credentials().await;
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        tracing::info!(logged_in = response.logged_in, "bridge transport connected");
        Ok(())
    }

    fn is_transport_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for BridgeClient {
    fn is_logged_in(&self) -> bool {
        self.shared.logged_in.load(Ordering::SeqCst)
    }

    async fn subscribe_pairing(&self) -> Result<mpsc::Receiver<PairingEvent>, PlatformError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(PlatformError::Closed);
        }
        let (tx, rx) = mpsc::channel(8);
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx)
    }

    async fn begin_pairing(&self) -> Result<(), PlatformError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(PlatformError::Closed);
        }
        if !self.is_transport_connected() {
            return Err(PlatformError::NotConnected);
        }
        let _: serde_json::Value = self.post("/v1/pair-qr", &serde_json::json!({})).await?;
        tracing::debug!("bridge pairing handshake started");
        Ok(())
    }

    async fn pair_phone(&self, phone_number: &str) -> Result<String, PlatformError> {
        if !self.is_transport_connected() {
            return Err(PlatformError::NotConnected);
        }
        let response: PairPhoneResponse =
            self.post("/v1/pair-phone", &PairPhoneRequest { phone_number }).await?;
        Ok(response.code)
    }

    async fn logout(&self) -> Result<(), PlatformError> {
        if !self.is_transport_connected() {
            return Err(PlatformError::NotConnected);
        }
        let _: serde_json::Value = self.post("/v1/logout", &serde_json::json!({})).await?;
        self.shared.forget_credentials().await;
        Ok(())
    }

    async fn disconnect(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if self.shared.connected.load(Ordering::SeqCst) {
            if let Err(err) = self
                .post::<serde_json::Value, _>("/v1/disconnect", &serde_json::json!({}))
                .await
            {
                tracing::debug!(error = %err, "bridge disconnect failed");
            }
        }
        if let Some(listener) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take() {
            listener.abort();
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.drop_subscribers();
    }
}

/// Opens `BridgeClient`s against one bridge base URL
#[derive(Debug, Clone)]
pub struct BridgeClientFactory {
    http: HttpClient,
    base_url: Url,
}

impl BridgeClientFactory {
    pub fn new(base_url: Url) -> Result<Self, PlatformError> {
        let http = HttpClient::builder()
            .user_agent(concat!("wacli-api/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl PlatformClientFactory for BridgeClientFactory {
    async fn open(&self, store_dir: &Path) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        let store = CredentialStore::open(store_dir).await?;
        let credentials = store.load().await?;
        tracing::debug!(
            store = %store.path().display(),
            paired = credentials.is_some(),
            "opened credential store"
        );
        Ok(Arc::new(BridgeClient::new(
            self.http.clone(),
            self.base_url.clone(),
            store,
            credentials,
        )))
    }
}
