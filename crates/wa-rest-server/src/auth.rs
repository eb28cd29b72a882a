// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! API key authentication

use crate::error::ServerError;
use axum::{
    extract::Request,
    http::{HeaderMap, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY_PARAM: &str = "api_key";

pub const MISSING_API_KEY: &str =
    "API key is required (use X-API-Key header, api_key query param, or Bearer token)";
pub const INVALID_API_KEY: &str = "Invalid API key";

/// Authentication configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    api_keys: Arc<Vec<String>>,
}

impl AuthConfig {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
        }
    }

    /// Validate API key authentication
    pub fn validate_api_key(&self, provided_key: &str) -> Result<(), ServerError> {
        if self.api_keys.iter().any(|key| key == provided_key) {
            Ok(())
        } else {
            Err(ServerError::Auth(INVALID_API_KEY.to_string()))
        }
    }
}

/// Find the API key in the request: header, query, then `Authorization`
pub fn extract_api_key(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|k| !k.is_empty())
    {
        return Some(key.to_string());
    }

    if let Some(key) = uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == API_KEY_QUERY_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    }) {
        return Some(key);
    }

    let auth = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("ApiKey "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
pub async fn auth_middleware(auth_config: AuthConfig, req: Request, next: Next) -> Response {
    let result = match extract_api_key(req.headers(), req.uri()) {
        Some(key) => auth_config.validate_api_key(&key).inspect_err(|_| {
            tracing::warn!(
                api_key = %wa_logging::redact(&key),
                path = %req.uri().path(),
                "rejected request with unknown API key"
            );
        }),
        None => {
            tracing::debug!(path = %req.uri().path(), "request without API key");
            Err(ServerError::Auth(MISSING_API_KEY.to_string()))
        }
    };

    match result {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}
