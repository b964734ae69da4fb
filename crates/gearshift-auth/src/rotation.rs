// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted rotation list of recently used credentials.
//!
//! The file is a JSON array of `{token, expiresAt, source}` objects, newest
//! first, with `expiresAt` in epoch milliseconds. Writes go through a
//! temporary file in the same directory that is renamed over the target, so
//! readers never observe a partial list.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gearshift_core::{Credential, GearshiftError};

/// On-disk shape of one rotation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RotationEntry {
    token: String,
    expires_at: i64,
    #[serde(default)]
    source: String,
}

impl RotationEntry {
    fn from_credential(credential: &Credential) -> Self {
        Self {
            token: credential.secret.expose_secret().to_string(),
            expires_at: credential.expires_at.timestamp_millis(),
            source: credential.source.clone(),
        }
    }

    fn into_credential(self) -> Option<Credential> {
        if self.token.trim().is_empty() {
            return None;
        }
        let expires_at =
            DateTime::<Utc>::from_timestamp_millis(self.expires_at).unwrap_or(DateTime::UNIX_EPOCH);
        Some(Credential::new(self.token, expires_at, self.source))
    }
}

/// Bounded, newest-first list of credentials persisted at one path.
#[derive(Debug, Clone)]
pub struct RotationFile {
    path: PathBuf,
    capacity: usize,
}

impl RotationFile {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads the list, newest first. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<Credential>, GearshiftError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GearshiftError::storage(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<RotationEntry> =
            serde_json::from_str(&raw).map_err(|e| GearshiftError::ConfigMalformed {
                message: format!("rotation file {}: {e}", self.path.display()),
            })?;
        Ok(entries
            .into_iter()
            .filter_map(RotationEntry::into_credential)
            .take(self.capacity)
            .collect())
    }

    /// Puts `credential` at the front, dropping any older entry with the same
    /// secret and anything past capacity. Returns the list as written.
    pub fn push(&self, credential: &Credential) -> Result<Vec<Credential>, GearshiftError> {
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(GearshiftError::ConfigMalformed { message }) => {
                warn!(%message, "discarding unreadable rotation file");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        entries.retain(|existing| !existing.same_secret(&credential.secret));
        entries.insert(0, credential.clone());
        entries.truncate(self.capacity);
        self.write(&entries)?;
        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            source = credential.source.as_str(),
            "rotation file updated"
        );
        Ok(entries)
    }

    fn write(&self, credentials: &[Credential]) -> Result<(), GearshiftError> {
        let entries: Vec<RotationEntry> =
            credentials.iter().map(RotationEntry::from_credential).collect();
        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| GearshiftError::Internal(format!("failed to encode rotation list: {e}")))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(GearshiftError::storage)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(GearshiftError::storage)?;
        tmp.write_all(&json).map_err(GearshiftError::storage)?;
        tmp.as_file().sync_all().map_err(GearshiftError::storage)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
                .map_err(GearshiftError::storage)?;
        }

        tmp.persist(&self.path)
            .map_err(|e| GearshiftError::storage(e.error))?;
        Ok(())
    }
}
