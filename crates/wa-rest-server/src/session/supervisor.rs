// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Drives a single connect call against the platform client

use super::error::{SessionError, SessionResult};
use crate::platform::{PairingEvent, PlatformClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A scannable code together with the validity the platform advertised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub ttl: Duration,
}

/// Callback receiving pairing codes on the connect task
pub type CodeSink = Box<dyn Fn(IssuedCode) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Credentials were already valid; nothing was done
    AlreadyAuthenticated,
    /// Transport is up (no pairing requested)
    Connected,
    /// A pairing handshake completed
    Paired,
}

pub struct ConnectionSupervisor {
    client: Arc<dyn PlatformClient>,
    shutdown: CancellationToken,
    code_observer: Option<CodeSink>,
}

impl ConnectionSupervisor {
    pub fn new(client: Arc<dyn PlatformClient>, shutdown: CancellationToken) -> Self {
        Self {
            client,
            shutdown,
            code_observer: None,
        }
    }

    /// Also report every rotated code, before `on_code` sees the first one
    pub fn observe_codes(mut self, observer: CodeSink) -> Self {
        self.code_observer = Some(observer);
        self
    }

    /// Connect, optionally running the pairing handshake to completion.
    ///
    /// With `wait_for_pairing`, `on_code` is invoked with the first code only.
    /// The call is bounded by `deadline` and by session shutdown.
    pub async fn connect(
        &self,
        deadline: Duration,
        wait_for_pairing: bool,
        on_code: Option<CodeSink>,
    ) -> SessionResult<ConnectOutcome> {
        if wait_for_pairing && self.client.is_logged_in() {
            return Ok(ConnectOutcome::AlreadyAuthenticated);
        }

        let label = if wait_for_pairing { "pairing" } else { "connection" };
        let work = async {
            if wait_for_pairing {
                self.pair(on_code).await
            } else {
                self.client.ensure_transport_connected().await?;
                Ok(ConnectOutcome::Connected)
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::debug!(label, "connect aborted by shutdown");
                Err(SessionError::Closed)
            }
            result = tokio::time::timeout(deadline, work) => {
                result.unwrap_or(Err(SessionError::DeadlineExceeded(label)))
            }
        }
    }

    async fn pair(&self, on_code: Option<CodeSink>) -> SessionResult<ConnectOutcome> {
        // Subscribe before the handshake starts or the first code can be missed
        let mut events = self.client.subscribe_pairing().await?;
        self.client.ensure_transport_connected().await?;
        self.client.begin_pairing().await?;

        let mut code_seen = false;
        while let Some(event) = events.recv().await {
            match event {
                PairingEvent::Code { code, timeout } => {
                    let issued = IssuedCode { code, ttl: timeout };
                    if let Some(observer) = &self.code_observer {
                        observer(issued.clone());
                    }
                    if code_seen {
                        tracing::debug!(ttl_secs = timeout.as_secs(), "pairing code rotated");
                        continue;
                    }
                    code_seen = true;
                    tracing::info!(ttl_secs = timeout.as_secs(), "pairing code issued");
                    if let Some(sink) = &on_code {
                        sink(issued);
                    }
                }
                PairingEvent::Success => {
                    tracing::info!("pairing completed");
                    return Ok(ConnectOutcome::Paired);
                }
                PairingEvent::Timeout => {
                    tracing::warn!("platform stopped issuing pairing codes");
                    return Err(SessionError::DeadlineExceeded("pairing code scan"));
                }
                PairingEvent::Error(reason) => {
                    tracing::warn!(%reason, "pairing rejected");
                    return Err(SessionError::Rejected(reason));
                }
            }
        }

        if self.client.is_logged_in() {
            return Ok(ConnectOutcome::Paired);
        }
        Err(SessionError::Connection("pairing event stream closed".to_string()))
    }
}
