// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Health check endpoints

use crate::ServerResult;
use axum::Json;
use wa_rest_api_contract::{HealthResponse, VersionResponse};

pub const SERVICE_NAME: &str = "wacli-api";

/// Health check endpoint
pub async fn health_check() -> ServerResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Version endpoint
pub async fn version() -> ServerResult<Json<VersionResponse>> {
    Ok(Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
