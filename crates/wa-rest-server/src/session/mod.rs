// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Session authentication orchestrator
//!
//! [`SessionHandle`] owns the platform client. [`PairingCoordinator`] runs
//! the QR and phone pairing flows on top of [`ConnectionSupervisor`],
//! [`AuthStatusPoller`] waits for pairing to finish and [`LogoutFlow`] ends
//! the session.

pub mod error;
pub mod handle;
pub mod logout;
pub mod pairing;
pub mod poller;
pub mod qr;
pub mod slot;
pub mod supervisor;

pub use error::{SessionError, SessionResult};
pub use handle::SessionHandle;
pub use logout::LogoutFlow;
pub use pairing::{PairingCoordinator, PairingMode, QrAttemptPhase};
pub use poller::AuthStatusPoller;
pub use slot::{SlotReceiver, SlotSender, single_slot};
pub use supervisor::{CodeSink, ConnectOutcome, ConnectionSupervisor, IssuedCode};
