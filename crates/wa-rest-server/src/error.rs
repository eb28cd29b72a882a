// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server error types and handling

use crate::session::SessionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use wa_rest_api_contract::ProblemDetails;

const ERROR_TYPE_BASE: &str = "https://wacli.dev/errors";

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `/auth/wait` ran out of time; the session is still unpaired
    #[error("timed out waiting for pairing")]
    PairingWaitTimeout,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn problem(kind: &str, title: &str, status: StatusCode, detail: String) -> ProblemDetails {
    ProblemDetails {
        problem_type: format!("{}/{}", ERROR_TYPE_BASE, kind),
        title: title.to_string(),
        status: Some(status.as_u16()),
        detail,
        authenticated: None,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Session(err) => match err {
                SessionError::AlreadyAuthenticated => StatusCode::CONFLICT,
                SessionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                SessionError::DeadlineExceeded(_) => StatusCode::REQUEST_TIMEOUT,
                SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SessionError::Connection(_)
                | SessionError::Rejected(_)
                | SessionError::PairingRequest(_)
                | SessionError::Initialization(_)
                | SessionError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::PairingWaitTimeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert error to Problem+JSON response
    pub fn to_problem(&self) -> ProblemDetails {
        let status = self.status();
        match self {
            ServerError::Session(err) => {
                let (kind, title) = match err {
                    SessionError::AlreadyAuthenticated => ("conflict", "Already Authenticated"),
                    SessionError::NotAuthenticated => ("not-authenticated", "Not Authenticated"),
                    SessionError::DeadlineExceeded(_) => ("timeout", "Request Timeout"),
                    SessionError::InvalidInput(_) => ("bad-request", "Bad Request"),
                    SessionError::Connection(_) => ("connection", "Connection Failed"),
                    SessionError::Rejected(_) => ("pairing-rejected", "Pairing Rejected"),
                    SessionError::PairingRequest(_) => ("pairing-request", "Pairing Request Failed"),
                    SessionError::Initialization(_) => ("initialization", "Client Initialization Failed"),
                    SessionError::Closed => ("shutdown", "Session Closed"),
                };
                let mut details = problem(kind, title, status, err.to_string());
                if matches!(err, SessionError::AlreadyAuthenticated) {
                    details.authenticated = Some(true);
                }
                details
            }
            ServerError::PairingWaitTimeout => ProblemDetails {
                authenticated: Some(false),
                ..problem("timeout", "Request Timeout", status, self.to_string())
            },
            ServerError::Auth(msg) => problem("auth", "Authentication Failed", status, msg.clone()),
            ServerError::BadRequest(msg) => problem("bad-request", "Bad Request", status, msg.clone()),
            ServerError::Internal(msg) => {
                problem("internal", "Internal Server Error", status, msg.clone())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.to_problem())).into_response()
    }
}

/// Convert any error to ServerError
impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

/// Convert IO errors
impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {}", err))
    }
}
