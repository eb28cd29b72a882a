// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Accepted API keys; must not be empty
    pub api_keys: Vec<String>,

    /// Directory holding the linked device credentials
    pub store_dir: PathBuf,

    /// Base URL of the platform bridge sidecar
    pub bridge_url: String,

    /// Enable permissive CORS headers
    pub enable_cors: bool,

    pub pairing: PairingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            api_keys: Vec::new(),
            store_dir: default_store_dir(),
            bridge_url: "http://127.0.0.1:8765".to_string(),
            enable_cors: false,
            pairing: PairingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_keys.is_empty() {
            anyhow::bail!("at least one API key is required (set WACLI_API_KEYS)");
        }
        self.pairing.validate()
    }
}

/// Timing of the pairing flows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    /// How long a QR request waits for the first code
    pub qr_code_wait: Duration,
    /// Outer bound of a background QR pairing attempt
    pub qr_attempt_deadline: Duration,
    /// Advertised validity of a QR code
    pub qr_code_expires_in: Duration,
    pub phone_pair_timeout: Duration,
    /// Advertised validity of a phone pairing code
    pub phone_code_expires_in: Duration,
    pub auth_wait_deadline: Duration,
    pub auth_poll_interval: Duration,
    pub logout_timeout: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            qr_code_wait: Duration::from_secs(10),
            qr_attempt_deadline: Duration::from_secs(60),
            qr_code_expires_in: Duration::from_secs(60),
            phone_pair_timeout: Duration::from_secs(30),
            phone_code_expires_in: Duration::from_secs(300),
            auth_wait_deadline: Duration::from_secs(120),
            auth_poll_interval: Duration::from_secs(1),
            logout_timeout: Duration::from_secs(10),
        }
    }
}

impl PairingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth_poll_interval.is_zero() {
            anyhow::bail!("auth poll interval must be positive");
        }
        if self.qr_attempt_deadline < self.qr_code_wait {
            anyhow::bail!(
                "QR attempt deadline ({:?}) must not be shorter than the QR code wait ({:?})",
                self.qr_attempt_deadline,
                self.qr_code_wait
            );
        }
        Ok(())
    }
}

/// Pairing timing flags shared by the server binaries (use with `#[command(flatten)]`)
#[derive(Clone, Debug, clap::Args)]
pub struct PairingArgs {
    /// Seconds a QR request waits for the first code
    #[arg(long, env = "WACLI_QR_CODE_WAIT", default_value_t = 10)]
    pub qr_code_wait: u64,

    /// Seconds a background QR pairing attempt may run
    #[arg(long, env = "WACLI_QR_ATTEMPT_DEADLINE", default_value_t = 60)]
    pub qr_attempt_deadline: u64,

    /// Seconds a phone pairing request may take
    #[arg(long, env = "WACLI_PHONE_PAIR_TIMEOUT", default_value_t = 30)]
    pub phone_pair_timeout: u64,

    /// Seconds `/auth/wait` blocks before giving up
    #[arg(long, env = "WACLI_AUTH_WAIT_DEADLINE", default_value_t = 120)]
    pub auth_wait_deadline: u64,

    /// Milliseconds between authentication samples in `/auth/wait`
    #[arg(long, env = "WACLI_AUTH_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub auth_poll_interval_ms: u64,

    /// Seconds a logout may take
    #[arg(long, env = "WACLI_LOGOUT_TIMEOUT", default_value_t = 10)]
    pub logout_timeout: u64,
}

impl PairingArgs {
    pub fn into_config(self) -> PairingConfig {
        PairingConfig {
            qr_code_wait: Duration::from_secs(self.qr_code_wait),
            qr_attempt_deadline: Duration::from_secs(self.qr_attempt_deadline),
            phone_pair_timeout: Duration::from_secs(self.phone_pair_timeout),
            auth_wait_deadline: Duration::from_secs(self.auth_wait_deadline),
            auth_poll_interval: Duration::from_millis(self.auth_poll_interval_ms),
            logout_timeout: Duration::from_secs(self.logout_timeout),
            ..PairingConfig::default()
        }
    }
}

/// `~/.wacli`, or `./.wacli` when no home directory is known
pub fn default_store_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".wacli")
}

/// Split a comma separated key list, dropping blanks
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
