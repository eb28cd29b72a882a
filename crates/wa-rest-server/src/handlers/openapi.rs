// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! OpenAPI specification endpoint

use crate::ServerResult;
use axum::Json;

/// OpenAPI document of the contract types
pub async fn openapi_spec() -> ServerResult<Json<utoipa::openapi::OpenApi>> {
    let mut spec = wa_rest_api_contract::openapi_schema();
    spec.info.version = env!("CARGO_PKG_VERSION").to_string();
    Ok(Json(spec))
}
