// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dependency wiring for the REST server

use crate::{config::ServerConfig, platform::BridgeClientFactory, state::AppState};
use anyhow::{Context, Result};
use std::sync::Arc;
use url::Url;

/// Production wiring: the session talks to the platform bridge sidecar
pub struct DefaultServerDependencies {
    state: AppState,
}

impl DefaultServerDependencies {
    /// Build default dependencies. Nothing connects until the first request.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let bridge_url = Url::parse(&config.bridge_url)
            .with_context(|| format!("invalid bridge URL '{}'", config.bridge_url))?;
        let factory = BridgeClientFactory::new(bridge_url)
            .context("failed to build bridge HTTP client")?;

        tracing::debug!(
            bridge = %factory.base_url(),
            store_dir = %config.store_dir.display(),
            "wired bridge platform client"
        );
        Ok(Self {
            state: AppState::new(config, Arc::new(factory)),
        })
    }

    /// Consume the dependency builder and return the resulting app state
    pub fn into_state(self) -> AppState {
        self.state
    }
}
