// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wait for pairing to complete by sampling the session

use super::error::{SessionError, SessionResult};
use super::handle::SessionHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use wa_rest_api_contract::WaitForPairingResponse;

pub const ALREADY_AUTHENTICATED: &str = "already authenticated";
pub const PAIRING_SUCCESSFUL: &str = "pairing successful";

pub struct AuthStatusPoller {
    session: Arc<SessionHandle>,
    interval: Duration,
    deadline: Duration,
}

impl AuthStatusPoller {
    pub fn new(session: Arc<SessionHandle>, interval: Duration, deadline: Duration) -> Self {
        Self {
            session,
            interval,
            deadline,
        }
    }

    /// Block until the session is authenticated or the deadline passes.
    ///
    /// Running out of time yields `DeadlineExceeded`; waiting alone never
    /// produces any other error.
    pub async fn wait(&self) -> SessionResult<WaitForPairingResponse> {
        self.session.ensure_opened().await?;
        if self.session.is_authenticated() {
            return Ok(WaitForPairingResponse {
                authenticated: true,
                message: ALREADY_AUTHENTICATED.to_string(),
            });
        }

        let shutdown = self.session.shutdown_token();
        let deadline = tokio::time::sleep_until(Instant::now() + self.deadline);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(SessionError::Closed),
                _ = &mut deadline => {
                    tracing::info!(deadline_secs = self.deadline.as_secs(), "gave up waiting for pairing");
                    return Err(SessionError::DeadlineExceeded("pairing"));
                }
                _ = ticker.tick() => {
                    if self.session.is_authenticated() {
                        return Ok(WaitForPairingResponse {
                            authenticated: true,
                            message: PAIRING_SUCCESSFUL.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SimulatedPlatform, SimulatedPlatformFactory, SimulationOptions};

    fn poller(platform: &SimulatedPlatform, deadline: Duration) -> AuthStatusPoller {
        let factory = SimulatedPlatformFactory::new(platform.clone());
        let session = Arc::new(SessionHandle::new("/tmp/wacli-unused", Arc::new(factory)));
        AuthStatusPoller::new(session, Duration::from_secs(1), deadline)
    }

    #[tokio::test(start_paused = true)]
    async fn already_authenticated_on_first_sample() {
        let platform = SimulatedPlatform::new(SimulationOptions {
            logged_in: true,
            ..Default::default()
        });
        let started = Instant::now();

        let response = poller(&platform, Duration::from_secs(120)).wait().await.unwrap();
        assert_eq!(response.message, ALREADY_AUTHENTICATED);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_pairing_once_it_happens() {
        let platform = SimulatedPlatform::new(Default::default());
        let poller = poller(&platform, Duration::from_secs(120));

        let scanner = platform.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            scanner.confirm_pairing();
        });

        let started = Instant::now();
        let response = poller.wait().await.unwrap();
        assert!(response.authenticated);
        assert_eq!(response.message, PAIRING_SUCCESSFUL);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_a_timeout_not_a_failure() {
        let platform = SimulatedPlatform::new(Default::default());

        let err = poller(&platform, Duration::from_secs(5)).wait().await.unwrap_err();
        assert_eq!(err, SessionError::DeadlineExceeded("pairing"));
    }
}
