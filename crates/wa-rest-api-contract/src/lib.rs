// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! wacli REST API contract types and validation
//!
//! These types are shared between the server, its mock backend and the
//! integration tests that drive the HTTP surface.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;

/// Generate OpenAPI schema for the API contract types
#[cfg(feature = "utoipa")]
pub fn openapi_schema() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi;
    #[derive(OpenApi)]
    #[openapi(
        info(title = "wacli REST API"),
        paths(),
        components(schemas(
            AuthStatusResponse,
            QrCodeResponse,
            PairPhoneRequest,
            PairPhoneResponse,
            WaitForPairingResponse,
            LogoutResponse,
            HealthResponse,
            VersionResponse,
            ProblemDetails
        ))
    )]
    struct ApiDoc;
    ApiDoc::openapi()
}
