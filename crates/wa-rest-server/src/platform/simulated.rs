// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Deterministic in-process platform used by the mock server and the tests
//!
//! Pairing is scripted: `begin_pairing` emits the first code after
//! `code_delay` and rotates codes every `code_ttl`. When `scan_after` is set
//! the "user" scans that long after the first code and the device becomes
//! logged in, whether or not anybody is still listening. Beginning again
//! restarts the script; code numbering continues across handshakes.

use super::{PairingEvent, PlatformClient, PlatformClientFactory, PlatformError, TransportControl};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Knobs for the simulated platform
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Delay between transport connect and the first pairing code
    pub code_delay: Duration,
    /// Validity the platform advertises for each code
    pub code_ttl: Duration,
    /// Codes issued before the platform gives up with `PairingEvent::Timeout`
    pub code_count: usize,
    /// Simulated user scan, measured from the first code
    pub scan_after: Option<Duration>,
    /// Added latency of every transport connect
    pub connect_latency: Duration,
    /// Fail every transport connect with this message
    pub connect_error: Option<String>,
    /// Reject the pairing handshake with this reason instead of issuing codes
    pub pairing_error: Option<String>,
    /// Fail phone pairing requests with this message
    pub pair_phone_error: Option<String>,
    /// Code returned by phone pairing
    pub phone_code: String,
    /// Start with paired credentials
    pub logged_in: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            code_delay: Duration::from_millis(200),
            code_ttl: Duration::from_secs(60),
            code_count: 3,
            scan_after: None,
            connect_latency: Duration::ZERO,
            connect_error: None,
            pairing_error: None,
            pair_phone_error: None,
            phone_code: "ABCD-EFGH".to_string(),
            logged_in: false,
        }
    }
}

/// Call counters, readable by tests to prove that no network call happened
#[derive(Debug, Default)]
pub struct CallCounters {
    pub connect: AtomicUsize,
    pub subscribe: AtomicUsize,
    pub begin_pairing: AtomicUsize,
    pub pair_phone: AtomicUsize,
    pub logout: AtomicUsize,
    pub disconnect: AtomicUsize,
}

#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<SimulatedInner>,
}

struct SimulatedInner {
    options: SimulationOptions,
    connected: AtomicBool,
    logged_in: AtomicBool,
    subscribers: Mutex<Vec<mpsc::Sender<PairingEvent>>>,
    connection: Mutex<Option<CancellationToken>>,
    script: Mutex<Option<CancellationToken>>,
    counters: CallCounters,
    codes_issued: AtomicUsize,
}

impl SimulatedPlatform {
    pub fn new(options: SimulationOptions) -> Self {
        let logged_in = options.logged_in;
        Self {
            inner: Arc::new(SimulatedInner {
                options,
                connected: AtomicBool::new(false),
                logged_in: AtomicBool::new(logged_in),
                subscribers: Mutex::new(Vec::new()),
                connection: Mutex::new(None),
                script: Mutex::new(None),
                counters: CallCounters::default(),
                codes_issued: AtomicUsize::new(0),
            }),
        }
    }

    pub fn counters(&self) -> &CallCounters {
        &self.inner.counters
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.counters.connect.load(Ordering::SeqCst)
    }

    pub fn codes_issued(&self) -> usize {
        self.inner.codes_issued.load(Ordering::SeqCst)
    }

    /// Complete pairing as if the user had scanned the current code
    pub fn confirm_pairing(&self) {
        self.inner.complete_pairing();
    }

    /// Drop the link from the platform side (device removed on the phone)
    pub fn revoke(&self) {
        self.inner.logged_in.store(false, Ordering::SeqCst);
    }

    fn start_pairing_script(&self, token: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("simulated pairing script cancelled");
                }
                _ = inner.run_pairing_script() => {}
            }
        });
    }
}

impl SimulatedInner {
    async fn run_pairing_script(&self) {
        let options = &self.options;
        sleep(options.code_delay).await;

        if let Some(reason) = &options.pairing_error {
            self.broadcast(PairingEvent::Error(reason.clone()));
            return;
        }

        let scan_at = options.scan_after;
        let mut elapsed = Duration::ZERO;
        for _ in 0..options.code_count.max(1) {
            let index = self.codes_issued.fetch_add(1, Ordering::SeqCst);
            self.broadcast(PairingEvent::Code {
                code: format!("2@simulated-ref-{}", index),
                timeout: options.code_ttl,
            });

            let next = elapsed + options.code_ttl;
            match scan_at {
                Some(scan) if scan < next => {
                    sleep(scan - elapsed).await;
                    self.complete_pairing();
                    return;
                }
                _ => {
                    sleep(options.code_ttl).await;
                    elapsed = next;
                }
            }
        }

        self.broadcast(PairingEvent::Timeout);
    }

    fn complete_pairing(&self) {
        if self.logged_in.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("simulated device paired");
        self.broadcast(PairingEvent::Success);
    }

    fn broadcast(&self, event: PairingEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

}

#[async_trait]
impl TransportControl for SimulatedPlatform {
    async fn ensure_transport_connected(&self) -> Result<(), PlatformError> {
        if self.inner.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.inner.counters.connect.fetch_add(1, Ordering::SeqCst);
        if !self.inner.options.connect_latency.is_zero() {
            sleep(self.inner.options.connect_latency).await;
        }
        if let Some(message) = &self.inner.options.connect_error {
            return Err(PlatformError::Transport(message.clone()));
        }

        let token = CancellationToken::new();
        {
            let mut connection = self.inner.connection.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = connection.replace(token.clone()) {
                previous.cancel();
            }
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_transport_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for SimulatedPlatform {
    fn is_logged_in(&self) -> bool {
        self.inner.logged_in.load(Ordering::SeqCst)
    }

    async fn subscribe_pairing(&self) -> Result<mpsc::Receiver<PairingEvent>, PlatformError> {
        self.inner.counters.subscribe.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx)
    }

    async fn begin_pairing(&self) -> Result<(), PlatformError> {
        self.inner.counters.begin_pairing.fetch_add(1, Ordering::SeqCst);
        let connection = self
            .inner
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(PlatformError::NotConnected)?;
        if self.inner.logged_in.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("device is already paired".to_string()));
        }

        let token = connection.child_token();
        if let Some(previous) = self
            .inner
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone())
        {
            tracing::debug!("restarting simulated pairing script");
            previous.cancel();
        }
        self.start_pairing_script(token);
        Ok(())
    }

    async fn pair_phone(&self, phone_number: &str) -> Result<String, PlatformError> {
        self.inner.counters.pair_phone.fetch_add(1, Ordering::SeqCst);
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(PlatformError::NotConnected);
        }
        if let Some(message) = &self.inner.options.pair_phone_error {
            return Err(PlatformError::Rejected(message.clone()));
        }

        tracing::debug!(phone_digits = phone_number.len(), "simulated phone pairing code issued");
        if let Some(scan) = self.inner.options.scan_after {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                sleep(scan).await;
                inner.complete_pairing();
            });
        }
        Ok(self.inner.options.phone_code.clone())
    }

    async fn logout(&self) -> Result<(), PlatformError> {
        self.inner.counters.logout.fetch_add(1, Ordering::SeqCst);
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(PlatformError::NotConnected);
        }
        self.inner.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.counters.disconnect.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self
            .inner
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Factory handing out one shared simulated platform
#[derive(Clone)]
pub struct SimulatedPlatformFactory {
    platform: SimulatedPlatform,
    open_error: Option<String>,
    opens: Arc<AtomicUsize>,
}

impl SimulatedPlatformFactory {
    pub fn new(platform: SimulatedPlatform) -> Self {
        Self {
            platform,
            open_error: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every `open` fail like a corrupt credential store would
    pub fn failing(platform: SimulatedPlatform, message: impl Into<String>) -> Self {
        Self {
            open_error: Some(message.into()),
            ..Self::new(platform)
        }
    }

    pub fn platform(&self) -> &SimulatedPlatform {
        &self.platform
    }

    pub fn open_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClientFactory for SimulatedPlatformFactory {
    async fn open(&self, store_dir: &Path) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_error {
            return Err(PlatformError::Store(format!(
                "{} ({})",
                message,
                store_dir.display()
            )));
        }
        Ok(Arc::new(self.platform.clone()))
    }
}
