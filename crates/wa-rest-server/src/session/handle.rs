// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The process-wide account session

use super::error::{SessionError, SessionResult};
use crate::platform::{PlatformClient, PlatformClientFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Owns the single long-lived platform client.
///
/// The client object is created lazily on first use; creating it never
/// touches the network. Predicates read the client's own state and are safe
/// to call from any task.
pub struct SessionHandle {
    store_dir: PathBuf,
    factory: Arc<dyn PlatformClientFactory>,
    client: OnceCell<Arc<dyn PlatformClient>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl SessionHandle {
    pub fn new(store_dir: impl Into<PathBuf>, factory: Arc<dyn PlatformClientFactory>) -> Self {
        Self {
            store_dir: store_dir.into(),
            factory,
            client: OnceCell::new(),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// False until the client is opened and holds paired credentials
    pub fn is_authenticated(&self) -> bool {
        self.client.get().is_some_and(|client| client.is_logged_in())
    }

    pub fn is_connected(&self) -> bool {
        self.client
            .get()
            .is_some_and(|client| client.is_transport_connected())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Create the platform client once. A failed open is retried on the next call.
    pub async fn ensure_opened(&self) -> SessionResult<Arc<dyn PlatformClient>> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let client = self
            .client
            .get_or_try_init(|| async {
                tracing::debug!(store_dir = %self.store_dir.display(), "opening platform client");
                self.factory.open(&self.store_dir).await.map_err(|err| {
                    tracing::error!(error = %err, "failed to open platform client");
                    SessionError::Initialization(err.to_string())
                })
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Open the client and require paired credentials. No network call.
    pub async fn ensure_authenticated(&self) -> SessionResult<Arc<dyn PlatformClient>> {
        let client = self.ensure_opened().await?;
        if !client.is_logged_in() {
            return Err(SessionError::NotAuthenticated);
        }
        Ok(client)
    }

    /// Token cancelled when the session closes
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel background work and drop the transport. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("closing account session");
        self.shutdown.cancel();
        if let Some(client) = self.client.get() {
            client.disconnect().await;
        }
    }
}
