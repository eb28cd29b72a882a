// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::{
    config::ServerConfig,
    platform::{SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions},
    state::AppState,
};
use anyhow::Result;
use std::sync::Arc;

/// Dependency wiring for the mock REST server and the integration tests.
pub struct MockServerDependencies {
    state: AppState,
    factory: SimulatedPlatformFactory,
}

impl MockServerDependencies {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        Self::with_options(config, SimulationOptions::default()).await
    }

    pub async fn with_options(config: ServerConfig, options: SimulationOptions) -> Result<Self> {
        Ok(Self::with_factory(
            config,
            SimulatedPlatformFactory::new(SimulatedPlatform::new(options)),
        ))
    }

    /// Wire a prepared factory, e.g. one that fails to open
    pub fn with_factory(config: ServerConfig, factory: SimulatedPlatformFactory) -> Self {
        let state = AppState::new(config, Arc::new(factory.clone()));
        Self { state, factory }
    }

    /// Handle on the simulated platform for driving and inspecting it
    pub fn platform(&self) -> SimulatedPlatform {
        self.factory.platform().clone()
    }

    pub fn factory(&self) -> &SimulatedPlatformFactory {
        &self.factory
    }

    pub fn into_state(self) -> AppState {
        self.state
    }
}
