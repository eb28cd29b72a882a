// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error taxonomy of the session orchestrator

use crate::platform::PlatformError;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Benign short circuit: the device already holds paired credentials
    #[error("already authenticated")]
    AlreadyAuthenticated,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("pairing rejected: {0}")]
    Rejected(String),

    #[error("pairing request failed: {0}")]
    PairingRequest(String),

    /// Carries the name of the operation that ran out of time
    #[error("timed out waiting for {0}")]
    DeadlineExceeded(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to initialize client: {0}")]
    Initialization(String),

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::DeadlineExceeded(_))
    }
}

impl From<PlatformError> for SessionError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Transport(msg) => SessionError::Connection(msg),
            PlatformError::NotConnected => SessionError::Connection(err.to_string()),
            PlatformError::Rejected(msg) => SessionError::Rejected(msg),
            PlatformError::Store(msg) => SessionError::Initialization(msg),
            PlatformError::Closed => SessionError::Closed,
        }
    }
}
