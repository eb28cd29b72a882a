// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::error::{SessionError, SessionResult};
use super::pairing::PairingCoordinator;
use super::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use std::time::Duration;
use wa_rest_api_contract::LogoutResponse;

pub const LOGGED_OUT: &str = "successfully logged out";

/// Unlinks the device from the account
pub struct LogoutFlow {
    coordinator: Arc<PairingCoordinator>,
    timeout: Duration,
}

impl LogoutFlow {
    pub fn new(coordinator: Arc<PairingCoordinator>, timeout: Duration) -> Self {
        Self {
            coordinator,
            timeout,
        }
    }

    pub async fn run(&self) -> SessionResult<LogoutResponse> {
        let session = self.coordinator.session();
        let client = session.ensure_authenticated().await?;

        let supervisor = ConnectionSupervisor::new(Arc::clone(&client), session.shutdown_token());
        let work = async {
            supervisor.connect(self.timeout, false, None).await?;
            client.logout().await.map_err(SessionError::from)
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .unwrap_or(Err(SessionError::DeadlineExceeded("logout")))?;

        self.coordinator.reset().await;
        tracing::info!("device logged out");
        Ok(LogoutResponse {
            logged_out: true,
            message: LOGGED_OUT.to_string(),
        })
    }
}
