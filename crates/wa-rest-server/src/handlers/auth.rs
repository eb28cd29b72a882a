// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Account authentication endpoints

use crate::error::{ServerError, ServerResult};
use crate::session::SessionError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use wa_rest_api_contract::{
    AuthStatusResponse, LogoutResponse, PairPhoneRequest, PairPhoneResponse, QrCodeResponse,
    WaitForPairingResponse,
};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

fn status_fragment(status: &AuthStatusResponse) -> String {
    let (class, text) = if status.authenticated {
        ("connected", "Connected")
    } else {
        ("disconnected", "Disconnected")
    };
    format!(
        r#"<div class="status-card">
	<span class="status-indicator {class}"></span>
	<span class="status-text">{text}</span>
</div>
<script>
	updateUI({{authenticated: {}, connected: {}}});
</script>"#,
        status.authenticated, status.connected
    )
}

/// `GET /auth/status`. Never opens or connects the client.
pub async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let status = AuthStatusResponse {
        authenticated: state.session.is_authenticated(),
        connected: state.session.is_connected(),
    };
    if is_htmx(&headers) {
        return Html(status_fragment(&status)).into_response();
    }
    Json(status).into_response()
}

/// `GET /auth/qr`
pub async fn request_qr_code(State(state): State<AppState>) -> ServerResult<Json<QrCodeResponse>> {
    let response = state.pairing.request_qr_code().await?;
    Ok(Json(response))
}

/// `POST /auth/pair`
pub async fn pair_phone(
    State(state): State<AppState>,
    body: Result<Json<PairPhoneRequest>, JsonRejection>,
) -> ServerResult<Json<PairPhoneResponse>> {
    let Json(request) = body.map_err(|rejection| {
        ServerError::BadRequest(format!("phone_number is required: {}", rejection.body_text()))
    })?;
    let response = state.pairing.request_phone_code(&request).await?;
    Ok(Json(response))
}

/// `GET /auth/wait`
pub async fn wait_for_pairing(
    State(state): State<AppState>,
) -> ServerResult<Json<WaitForPairingResponse>> {
    match state.poller.wait().await {
        Ok(response) => Ok(Json(response)),
        Err(SessionError::DeadlineExceeded(_)) => Err(ServerError::PairingWaitTimeout),
        Err(err) => Err(err.into()),
    }
}

/// `POST /auth/logout`
pub async fn logout(State(state): State<AppState>) -> ServerResult<Json<LogoutResponse>> {
    let response = state.logout.run().await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn htmx_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("HX-Request", HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }

    #[test]
    fn fragment_reflects_state() {
        let html = status_fragment(&AuthStatusResponse {
            authenticated: true,
            connected: false,
        });
        assert!(html.contains("status-indicator connected"));
        assert!(html.contains("updateUI({authenticated: true, connected: false});"));
    }
}
