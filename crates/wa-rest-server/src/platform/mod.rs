// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Messaging platform client seam
//!
//! The wire protocol belongs to the platform client. The orchestrator only
//! sees the traits below: a transport capability, pairing/logout calls and a
//! stream of pairing events. Connecting the transport never starts a
//! handshake by itself; `begin_pairing` does.

pub mod bridge;
pub mod credentials;
pub mod simulated;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use bridge::{BridgeClient, BridgeClientFactory};
pub use credentials::{CredentialStore, DeviceCredentials};
pub use simulated::{SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions};

/// Events emitted by the platform while a pairing handshake is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A scannable code; `timeout` is how long the platform honours it
    Code { code: String, timeout: Duration },
    /// The device was linked and credentials were persisted
    Success,
    /// The platform stopped issuing codes without a scan
    Timeout,
    /// The platform refused the pairing
    Error(String),
}

/// Errors reported by platform client implementations
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("platform rejected the request: {0}")]
    Rejected(String),

    #[error("credential store error: {0}")]
    Store(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("client is closed")]
    Closed,
}

/// Low-level transport capability.
///
/// Phone pairing needs a live socket without waiting for authentication,
/// which is all this exposes.
#[async_trait]
pub trait TransportControl: Send + Sync {
    /// Connect the transport when it is not connected yet
    async fn ensure_transport_connected(&self) -> Result<(), PlatformError>;

    fn is_transport_connected(&self) -> bool;
}

/// Long-lived handle to the platform account
#[async_trait]
pub trait PlatformClient: TransportControl {
    /// Whether paired device credentials are held
    fn is_logged_in(&self) -> bool;

    /// Subscribe to pairing events. Must be called before connecting for the
    /// first code to be observed.
    async fn subscribe_pairing(&self) -> Result<mpsc::Receiver<PairingEvent>, PlatformError>;

    /// Start a QR pairing handshake on the connected transport. A handshake
    /// that is already running is replaced. Events go to current subscribers.
    async fn begin_pairing(&self) -> Result<(), PlatformError>;

    /// Request a numeric pairing code for an already normalized phone number
    async fn pair_phone(&self, phone_number: &str) -> Result<String, PlatformError>;

    /// Unlink this device and invalidate the persisted credentials
    async fn logout(&self) -> Result<(), PlatformError>;

    /// Drop the transport; pending pairing streams end
    async fn disconnect(&self);
}

/// Builds the platform client on first use
#[async_trait]
pub trait PlatformClientFactory: Send + Sync {
    /// Create the client object. Must not connect the network; fails when the
    /// local credential store cannot be read.
    async fn open(&self, store_dir: &Path) -> Result<Arc<dyn PlatformClient>, PlatformError>;
}
