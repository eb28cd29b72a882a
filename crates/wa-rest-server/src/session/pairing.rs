// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! QR-code and phone-code pairing flows
//!
//! A QR pairing attempt runs on a detached task that outlives the HTTP
//! request which started it. The request only waits a short while for the
//! first code; the task keeps going until the device is paired, the
//! platform gives up, the attempt deadline passes or the session closes.
//! While an attempt is in flight, further QR requests join it instead of
//! starting another connect. Joiners are served the platform's current
//! code, which rotates for as long as the attempt runs.

use super::error::{SessionError, SessionResult};
use super::handle::SessionHandle;
use super::qr::render_png_data_uri;
use super::slot::single_slot;
use super::supervisor::{CodeSink, ConnectOutcome, ConnectionSupervisor, IssuedCode};
use crate::config::PairingConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout};
use uuid::Uuid;
use wa_rest_api_contract::validation::validate_pair_phone_request;
use wa_rest_api_contract::{
    PHONE_CODE_INSTRUCTIONS, PairPhoneRequest, PairPhoneResponse, QR_INSTRUCTIONS, QrCodeResponse,
};

/// Lifecycle of one QR pairing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrAttemptPhase {
    AwaitingCode,
    /// Latest code of the attempt; `ttl` is the validity it was issued with
    CodeDelivered {
        code: String,
        issued_at: Instant,
        ttl: Duration,
    },
    Paired,
    Failed(SessionError),
    TimedOut,
}

impl QrAttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QrAttemptPhase::Paired | QrAttemptPhase::Failed(_) | QrAttemptPhase::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    QrCode,
    PhoneCode,
}

struct InFlightAttempt {
    id: Uuid,
    mode: PairingMode,
    deadline: Instant,
    phase: watch::Receiver<QrAttemptPhase>,
}

type Registry = Arc<Mutex<Option<InFlightAttempt>>>;

pub struct PairingCoordinator {
    session: Arc<SessionHandle>,
    config: PairingConfig,
    in_flight: Registry,
}

impl PairingCoordinator {
    pub fn new(session: Arc<SessionHandle>, config: PairingConfig) -> Self {
        Self {
            session,
            config,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Whether a background QR attempt is registered and still running
    pub async fn has_attempt_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .await
            .as_ref()
            .is_some_and(|attempt| !attempt.phase.borrow().is_terminal())
    }

    /// Forget the in-flight attempt. The task itself stops on its own bounds.
    pub async fn reset(&self) {
        if let Some(attempt) = self.in_flight.lock().await.take() {
            tracing::debug!(attempt_id = %attempt.id, "dropped in-flight pairing attempt");
        }
    }

    /// Start or join a QR pairing attempt and return its code
    pub async fn request_qr_code(&self) -> SessionResult<QrCodeResponse> {
        let client = self.session.ensure_opened().await?;
        if client.is_logged_in() {
            return Err(SessionError::AlreadyAuthenticated);
        }

        let mut registry = self.in_flight.lock().await;
        if let Some(attempt) = registry.as_ref() {
            let phase = attempt.phase.borrow().clone();
            if !phase.is_terminal() && Instant::now() < attempt.deadline {
                tracing::debug!(attempt_id = %attempt.id, mode = ?attempt.mode, "joining in-flight QR attempt");
                if let Some(response) = self.fresh_code_response(&phase)? {
                    return Ok(response);
                }
                let phase = attempt.phase.clone();
                drop(registry);
                return self.await_phase(phase).await;
            }
        }

        let id = Uuid::new_v4();
        let (phase_tx, phase_rx) = watch::channel(QrAttemptPhase::AwaitingCode);
        let phase_tx = Arc::new(phase_tx);
        let (code_tx, mut code_rx) = single_slot::<IssuedCode>();
        let (outcome_tx, mut outcome_rx) = single_slot::<SessionResult<ConnectOutcome>>();

        *registry = Some(InFlightAttempt {
            id,
            mode: PairingMode::QrCode,
            deadline: Instant::now() + self.config.qr_attempt_deadline,
            phase: phase_rx,
        });
        drop(registry);

        let observer_phase = Arc::clone(&phase_tx);
        let observer: CodeSink = Box::new(move |issued: IssuedCode| {
            observer_phase.send_replace(QrAttemptPhase::CodeDelivered {
                code: issued.code,
                issued_at: Instant::now(),
                ttl: issued.ttl,
            });
        });
        let sink: CodeSink = Box::new(move |issued: IssuedCode| {
            if !code_tx.offer(issued) {
                tracing::debug!("pairing code arrived after the request gave up");
            }
        });

        let supervisor = ConnectionSupervisor::new(client, self.session.shutdown_token())
            .observe_codes(observer);
        let deadline = self.config.qr_attempt_deadline;
        let registry = Arc::clone(&self.in_flight);
        tracing::info!(attempt_id = %id, "starting QR pairing attempt");

        tokio::spawn(async move {
            let outcome = supervisor.connect(deadline, true, Some(sink)).await;
            let final_phase = match &outcome {
                Ok(_) => QrAttemptPhase::Paired,
                Err(SessionError::DeadlineExceeded(_)) => QrAttemptPhase::TimedOut,
                Err(err) => QrAttemptPhase::Failed(err.clone()),
            };
            match &outcome {
                Ok(result) => tracing::info!(attempt_id = %id, ?result, "QR pairing attempt finished"),
                Err(err) => tracing::warn!(attempt_id = %id, error = %err, "QR pairing attempt failed"),
            }
            phase_tx.send_replace(final_phase);
            outcome_tx.offer(outcome);

            let mut registry = registry.lock().await;
            if registry.as_ref().is_some_and(|attempt| attempt.id == id) {
                *registry = None;
            }
        });

        let waited = timeout(self.config.qr_code_wait, async {
            tokio::select! {
                biased;
                Some(code) = code_rx.recv_mut() => Ok(code),
                Some(outcome) = outcome_rx.recv_mut() => match outcome {
                    Ok(_) => Err(SessionError::AlreadyAuthenticated),
                    Err(err) => Err(err),
                },
                else => Err(SessionError::Connection(
                    "pairing attempt ended without a result".to_string(),
                )),
            }
        })
        .await;

        match waited {
            Ok(Ok(issued)) => {
                let expires_in = self.code_validity(issued.ttl);
                self.qr_response(issued.code, expires_in)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::info!(attempt_id = %id, "no QR code yet; attempt keeps running");
                Err(SessionError::DeadlineExceeded("QR code"))
            }
        }
    }

    /// Follow another request's attempt until it yields a code or ends
    async fn await_phase(
        &self,
        mut phase: watch::Receiver<QrAttemptPhase>,
    ) -> SessionResult<QrCodeResponse> {
        let waited = timeout(self.config.qr_code_wait, async {
            loop {
                let current = phase.borrow_and_update().clone();
                match current {
                    QrAttemptPhase::AwaitingCode => {}
                    QrAttemptPhase::CodeDelivered { .. } => {
                        // A stale code is skipped; the platform rotates it shortly
                        if let Some(response) = self.fresh_code_response(&current)? {
                            return Ok(response);
                        }
                    }
                    QrAttemptPhase::Paired => return Err(SessionError::AlreadyAuthenticated),
                    QrAttemptPhase::Failed(err) => return Err(err),
                    QrAttemptPhase::TimedOut => return Err(SessionError::DeadlineExceeded("pairing")),
                }
                if phase.changed().await.is_err() {
                    return Err(SessionError::Connection(
                        "pairing attempt ended without a result".to_string(),
                    ));
                }
            }
        })
        .await;

        waited.unwrap_or(Err(SessionError::DeadlineExceeded("QR code")))
    }

    /// Validity advertised to callers, capped by configuration
    fn code_validity(&self, platform_ttl: Duration) -> Duration {
        platform_ttl.min(self.config.qr_code_expires_in)
    }

    /// Response for the attempt's current code; `None` when it is missing or
    /// about to expire
    fn fresh_code_response(&self, phase: &QrAttemptPhase) -> SessionResult<Option<QrCodeResponse>> {
        let QrAttemptPhase::CodeDelivered {
            code,
            issued_at,
            ttl,
        } = phase
        else {
            return Ok(None);
        };
        let remaining = self
            .code_validity(*ttl)
            .checked_sub(issued_at.elapsed())
            .unwrap_or_default();
        if remaining < Duration::from_secs(1) {
            return Ok(None);
        }
        self.qr_response(code.clone(), remaining).map(Some)
    }

    fn qr_response(&self, code: String, expires_in: Duration) -> SessionResult<QrCodeResponse> {
        let qr_code_png = render_png_data_uri(&code).map_err(|err| {
            SessionError::Rejected(format!("platform issued an unusable code: {}", err))
        })?;
        Ok(QrCodeResponse {
            qr_code: code,
            qr_code_png,
            expires_in: expires_in.as_secs(),
            instructions: QR_INSTRUCTIONS.to_string(),
        })
    }

    /// Request a numeric pairing code for a phone number
    pub async fn request_phone_code(
        &self,
        request: &PairPhoneRequest,
    ) -> SessionResult<PairPhoneResponse> {
        let normalized = validate_pair_phone_request(request)
            .map_err(|err| SessionError::InvalidInput(err.to_string()))?;

        let client = self.session.ensure_opened().await?;
        if client.is_logged_in() {
            return Err(SessionError::AlreadyAuthenticated);
        }

        let shutdown = self.session.shutdown_token();
        let work = async {
            if !client.is_transport_connected() {
                client.ensure_transport_connected().await?;
            }
            client.pair_phone(&normalized).await.map_err(|err| match err {
                crate::platform::PlatformError::Closed => SessionError::Closed,
                other => SessionError::PairingRequest(other.to_string()),
            })
        };

        let pairing_code = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(SessionError::Closed),
            result = timeout(self.config.phone_pair_timeout, work) => {
                result.unwrap_or(Err(SessionError::DeadlineExceeded("phone pairing code")))?
            }
        };

        tracing::info!(
            mode = ?PairingMode::PhoneCode,
            phone = %wa_logging::redact(&normalized),
            "phone pairing code issued"
        );
        Ok(PairPhoneResponse {
            pairing_code,
            phone_number: request.phone_number.clone(),
            expires_in: self.config.phone_code_expires_in.as_secs(),
            instructions: PHONE_CODE_INSTRUCTIONS.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{
        PlatformClient, SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions,
        TransportControl,
    };

    fn coordinator(options: SimulationOptions) -> (PairingCoordinator, SimulatedPlatform) {
        coordinator_with(options, PairingConfig::default())
    }

    fn coordinator_with(
        options: SimulationOptions,
        config: PairingConfig,
    ) -> (PairingCoordinator, SimulatedPlatform) {
        let platform = SimulatedPlatform::new(options);
        let factory = SimulatedPlatformFactory::new(platform.clone());
        let session = Arc::new(SessionHandle::new("/tmp/wacli-unused", Arc::new(factory)));
        (PairingCoordinator::new(session, config), platform)
    }

    fn phone(number: &str) -> PairPhoneRequest {
        PairPhoneRequest {
            phone_number: number.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn qr_code_within_the_short_wait() {
        let (coordinator, _) = coordinator(SimulationOptions {
            code_delay: Duration::from_secs(1),
            ..Default::default()
        });

        let response = coordinator.request_qr_code().await.unwrap();
        assert_eq!(response.qr_code, "2@simulated-ref-0");
        assert!(response.qr_code_png.starts_with("data:image/png;base64,"));
        assert_eq!(response.expires_in, 60);
        assert_eq!(response.instructions, QR_INSTRUCTIONS);
    }

    #[tokio::test(start_paused = true)]
    async fn late_code_times_out_but_pairing_continues() {
        let (coordinator, platform) = coordinator(SimulationOptions {
            code_delay: Duration::from_secs(15),
            scan_after: Some(Duration::from_secs(1)),
            ..Default::default()
        });

        assert_eq!(
            coordinator.request_qr_code().await.err(),
            Some(SessionError::DeadlineExceeded("QR code"))
        );
        assert!(coordinator.has_attempt_in_flight().await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(platform.is_logged_in());
        assert!(coordinator.session().is_authenticated());
        assert!(!coordinator.has_attempt_in_flight().await);
    }

    #[tokio::test(start_paused = true)]
    async fn authenticated_request_starts_nothing() {
        let (coordinator, platform) = coordinator(SimulationOptions {
            logged_in: true,
            ..Default::default()
        });

        assert_eq!(
            coordinator.request_qr_code().await.err(),
            Some(SessionError::AlreadyAuthenticated)
        );
        assert_eq!(platform.connect_calls(), 0);
        assert!(!coordinator.has_attempt_in_flight().await);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_attempt() {
        let (coordinator, platform) = coordinator(SimulationOptions {
            code_delay: Duration::from_secs(2),
            ..Default::default()
        });
        let coordinator = Arc::new(coordinator);

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.request_qr_code().await }
        });
        let second = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.request_qr_code().await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.qr_code, second.qr_code);
        assert_eq!(platform.connect_calls(), 1);
        assert_eq!(platform.counters().subscribe.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn joiner_gets_remaining_validity() {
        let (coordinator, platform) = coordinator(SimulationOptions {
            code_delay: Duration::from_millis(500),
            ..Default::default()
        });

        let first = coordinator.request_qr_code().await.unwrap();
        assert_eq!(first.expires_in, 60);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let second = coordinator.request_qr_code().await.unwrap();
        assert_eq!(second.qr_code, first.qr_code);
        assert!(second.expires_in <= 40);
        assert_eq!(platform.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn joiners_follow_rotated_codes() {
        let (coordinator, platform) = coordinator_with(
            SimulationOptions {
                code_delay: Duration::from_millis(100),
                code_ttl: Duration::from_secs(20),
                code_count: 10,
                ..Default::default()
            },
            PairingConfig {
                qr_attempt_deadline: Duration::from_secs(300),
                ..Default::default()
            },
        );

        let first = coordinator.request_qr_code().await.unwrap();
        assert_eq!(first.qr_code, "2@simulated-ref-0");
        assert_eq!(first.expires_in, 20);

        tokio::time::sleep(Duration::from_secs(90)).await;
        let later = coordinator.request_qr_code().await.unwrap();
        assert_eq!(later.qr_code, "2@simulated-ref-4");
        assert!((1..=20).contains(&later.expires_in));
        assert_eq!(platform.connect_calls(), 1);
        assert_eq!(platform.counters().begin_pairing.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn joiner_waits_out_an_expiring_code() {
        let (coordinator, _) = coordinator(SimulationOptions {
            code_ttl: Duration::from_secs(20),
            code_count: 5,
            ..Default::default()
        });

        let first = coordinator.request_qr_code().await.unwrap();
        assert_eq!(first.qr_code, "2@simulated-ref-0");

        tokio::time::sleep(Duration::from_millis(19_500)).await;
        let next = coordinator.request_qr_code().await.unwrap();
        assert_eq!(next.qr_code, "2@simulated-ref-1");
        assert_eq!(next.expires_in, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn qr_after_phone_pairing_starts_a_handshake() {
        let (coordinator, platform) = coordinator(SimulationOptions::default());

        coordinator.request_phone_code(&phone("15550109999")).await.unwrap();
        assert!(platform.is_transport_connected());

        let response = coordinator.request_qr_code().await.unwrap();
        assert_eq!(response.qr_code, "2@simulated-ref-0");
        assert_eq!(platform.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn qr_after_platform_timeout_starts_again() {
        let (coordinator, platform) = coordinator(SimulationOptions {
            code_delay: Duration::from_millis(100),
            code_ttl: Duration::from_secs(5),
            code_count: 2,
            ..Default::default()
        });

        let first = coordinator.request_qr_code().await.unwrap();
        assert_eq!(first.qr_code, "2@simulated-ref-0");

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!coordinator.has_attempt_in_flight().await);
        assert_eq!(platform.codes_issued(), 2);

        let second = coordinator.request_qr_code().await.unwrap();
        assert_eq!(second.qr_code, "2@simulated-ref-2");
        assert_eq!(platform.connect_calls(), 1);
    }

    #[tokio::test]
    async fn unrenderable_current_code_is_reported() {
        let (coordinator, _) = coordinator(SimulationOptions::default());
        let phase = QrAttemptPhase::CodeDelivered {
            code: "x".repeat(4000),
            issued_at: Instant::now(),
            ttl: Duration::from_secs(60),
        };

        assert!(matches!(
            coordinator.fresh_code_response(&phase),
            Err(SessionError::Rejected(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn background_failure_surfaces_before_code() {
        let (coordinator, _) = coordinator(SimulationOptions {
            connect_error: Some("bridge unreachable".to_string()),
            ..Default::default()
        });

        assert_eq!(
            coordinator.request_qr_code().await.err(),
            Some(SessionError::Connection("bridge unreachable".to_string()))
        );
        tokio::task::yield_now().await;
        assert!(!coordinator.has_attempt_in_flight().await);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_session_stops_the_attempt() {
        let (coordinator, _) = coordinator(SimulationOptions {
            code_delay: Duration::from_secs(30),
            ..Default::default()
        });

        assert!(coordinator.request_qr_code().await.is_err());
        assert!(coordinator.has_attempt_in_flight().await);

        coordinator.session().close().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!coordinator.has_attempt_in_flight().await);
    }

    #[tokio::test]
    async fn phone_code_echoes_the_supplied_number() {
        let (coordinator, platform) = coordinator(SimulationOptions::default());

        let response = coordinator
            .request_phone_code(&PairPhoneRequest {
                phone_number: "+1 (555) 010-9999".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.pairing_code, "ABCD-EFGH");
        assert_eq!(response.phone_number, "+1 (555) 010-9999");
        assert_eq!(response.expires_in, 300);
        assert_eq!(platform.connect_calls(), 1);
    }

    #[tokio::test]
    async fn malformed_phone_is_rejected_before_the_network() {
        let (coordinator, platform) = coordinator(SimulationOptions::default());

        for raw in ["", "12ab", "+0123"] {
            let err = coordinator
                .request_phone_code(&PairPhoneRequest {
                    phone_number: raw.to_string(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::InvalidInput(_)), "{raw:?}: {err:?}");
        }
        assert_eq!(platform.connect_calls(), 0);
        assert_eq!(platform.counters().pair_phone.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn phone_pairing_failure_is_a_request_error() {
        let (coordinator, _) = coordinator(SimulationOptions {
            pair_phone_error: Some("rate-overlimit".to_string()),
            ..Default::default()
        });

        let err = coordinator
            .request_phone_code(&PairPhoneRequest {
                phone_number: "15550109999".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PairingRequest(msg) if msg.contains("rate-overlimit")));
    }
}
