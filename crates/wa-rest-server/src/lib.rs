// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! wacli REST API server
//!
//! Remote control of one linked messaging account over HTTP. The interesting
//! part lives in [`session`]: it bridges the platform's long-running pairing
//! handshake with short, deadline-bound HTTP requests.

pub mod auth;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod handlers;
pub mod mock_dependencies;
pub mod platform;
pub mod server;
pub mod session;
pub mod state;

pub use config::{PairingConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::Server;
