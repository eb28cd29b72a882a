// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! API contract types for the wacli REST service

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Instructions shown next to a scannable pairing code
pub const QR_INSTRUCTIONS: &str =
    "Scan this QR code with WhatsApp: Settings → Linked Devices → Link a Device";

/// Instructions shown next to a numeric pairing code
pub const PHONE_CODE_INSTRUCTIONS: &str =
    "Enter this code in WhatsApp: Settings → Linked Devices → Link a Device → Link with Phone Number";

/// `GET /auth/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub connected: bool,
}

/// `GET /auth/qr`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct QrCodeResponse {
    /// Raw code as emitted by the platform
    pub qr_code: String,
    /// `data:image/png;base64,...` rendering of `qr_code`
    pub qr_code_png: String,
    /// Seconds until the platform stops accepting this code
    pub expires_in: u64,
    pub instructions: String,
}

/// `POST /auth/pair` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PairPhoneRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone_number: String,
}

/// `POST /auth/pair` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PairPhoneResponse {
    pub pairing_code: String,
    /// Phone number exactly as supplied by the caller
    pub phone_number: String,
    pub expires_in: u64,
    pub instructions: String,
}

/// `GET /auth/wait`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct WaitForPairingResponse {
    pub authenticated: bool,
    pub message: String,
}

/// `POST /auth/logout`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct LogoutResponse {
    pub logged_out: bool,
    pub message: String,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

/// `GET /version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct VersionResponse {
    pub version: String,
}
