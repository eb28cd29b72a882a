// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File-backed store for the linked device credentials

use super::PlatformError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const CREDENTIALS_FILE: &str = "session.json";

/// Credentials of the paired device, as issued by the platform bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredentials {
    pub device_id: String,
    /// Opaque token the bridge uses to resume the device session
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    pub paired_at: DateTime<Utc>,
}

/// `<store_dir>/session.json`, owned by the platform client
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Ensure the store directory exists (mode 0700 on unix)
    pub async fn open(store_dir: &Path) -> Result<Self, PlatformError> {
        if !store_dir.exists() {
            async_fs::create_dir_all(store_dir).await.map_err(|err| {
                PlatformError::Store(format!("cannot create {}: {}", store_dir.display(), err))
            })?;
        }

        #[cfg(unix)]
        {
            let metadata = async_fs::metadata(store_dir).await.map_err(|err| {
                PlatformError::Store(format!("cannot access {}: {}", store_dir.display(), err))
            })?;
            if !metadata.is_dir() {
                return Err(PlatformError::Store(format!(
                    "{} is not a directory",
                    store_dir.display()
                )));
            }
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            async_fs::set_permissions(store_dir, permissions).await.map_err(|err| {
                PlatformError::Store(format!("cannot restrict {}: {}", store_dir.display(), err))
            })?;
        }

        Ok(Self {
            path: store_dir.join(CREDENTIALS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted credentials; `None` when the device was never paired
    pub async fn load(&self) -> Result<Option<DeviceCredentials>, PlatformError> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PlatformError::Store(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    err
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|err| {
            PlatformError::Store(format!("corrupt credentials in {}: {}", self.path.display(), err))
        })
    }

    /// Persist credentials through a temp file so readers never see a partial write
    pub async fn save(&self, credentials: &DeviceCredentials) -> Result<(), PlatformError> {
        let content = serde_json::to_vec_pretty(credentials)
            .map_err(|err| PlatformError::Store(err.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");

        async_fs::write(&tmp_path, content)
            .await
            .map_err(|err| PlatformError::Store(format!("cannot write credentials: {}", err)))?;
        async_fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|err| PlatformError::Store(format!("cannot commit credentials: {}", err)))?;
        Ok(())
    }

    /// Remove persisted credentials. Missing file is fine.
    pub async fn invalidate(&self) -> Result<(), PlatformError> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PlatformError::Store(format!(
                "cannot remove {}: {}",
                self.path.display(),
                err
            ))),
        }
    }
}
