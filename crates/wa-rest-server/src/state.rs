// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server state management

use crate::config::ServerConfig;
use crate::platform::PlatformClientFactory;
use crate::session::{AuthStatusPoller, LogoutFlow, PairingCoordinator, SessionHandle};
use std::sync::Arc;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// The account session; one per process
    pub session: Arc<SessionHandle>,

    pub pairing: Arc<PairingCoordinator>,
    pub poller: Arc<AuthStatusPoller>,
    pub logout: Arc<LogoutFlow>,
}

impl AppState {
    /// Wire the orchestrator around a platform client factory
    pub fn new(config: ServerConfig, factory: Arc<dyn PlatformClientFactory>) -> Self {
        let session = Arc::new(SessionHandle::new(config.store_dir.clone(), factory));
        let pairing = Arc::new(PairingCoordinator::new(
            Arc::clone(&session),
            config.pairing.clone(),
        ));
        let poller = Arc::new(AuthStatusPoller::new(
            Arc::clone(&session),
            config.pairing.auth_poll_interval,
            config.pairing.auth_wait_deadline,
        ));
        let logout = Arc::new(LogoutFlow::new(
            Arc::clone(&pairing),
            config.pairing.logout_timeout,
        ));

        Self {
            config,
            session,
            pairing,
            poller,
            logout,
        }
    }

    /// Get configuration reference
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
