//! Credential state for index nodes requiring a client certificate.
//!
//! The core never fetches or renews certificates itself; a renewal
//! collaborator writes the PEM bundle and a small metadata sidecar under
//! the bundle root, and this module reports whether that material is
//! usable. Callers holding a [`CertBundle`] build their own TLS-enabled
//! transport from the PEM path and inject it into the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File name of the PEM bundle inside the certificate directory.
const CREDENTIALS_FILE: &str = "credentials.pem";

/// File name of the renewal metadata sidecar.
const METADATA_FILE: &str = "credentials.json";

/// Directory under the bundle root holding trust anchors and credentials.
const CERT_DIR: &str = "certificates";

/// Errors raised while inspecting or recording credential state.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Reading or writing bundle files failed.
    #[error("cannot access credential file {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata sidecar is not valid JSON.
    #[error("invalid credential metadata in {path}: {source}")]
    Metadata {
        /// The sidecar path.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Usability of the on-disk certificate material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// A PEM bundle exists and its recorded expiry is in the future.
    Valid,
    /// A PEM bundle exists but its recorded expiry has passed, or no
    /// expiry was recorded.
    Expired,
    /// No PEM bundle exists under the bundle root.
    Missing,
}

/// Renewal metadata written next to the PEM bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CertMetadata {
    /// Expiry of the certificate, seconds since the Unix epoch.
    not_after: u64,
}

/// On-disk certificate bundle rooted at a configurable directory.
///
/// Paths are computed once at construction; [`Self::refresh`] re-reads the
/// filesystem, so status is never silently cached across renewals.
#[derive(Debug, Clone)]
pub struct CertBundle {
    cert_dir: PathBuf,
    cert_file: PathBuf,
    metadata_file: PathBuf,
    status: AuthStatus,
}

impl CertBundle {
    /// Opens the bundle under `root` and reads its current status.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Metadata`] if a sidecar exists but cannot be
    /// parsed, or [`AuthError::Io`] for filesystem failures other than
    /// plain absence.
    pub fn open(root: &Path) -> Result<Self, AuthError> {
        let cert_dir = root.join(CERT_DIR);
        let cert_file = cert_dir.join(CREDENTIALS_FILE);
        let metadata_file = cert_dir.join(METADATA_FILE);
        let mut bundle = Self {
            cert_dir,
            cert_file,
            metadata_file,
            status: AuthStatus::Missing,
        };
        bundle.refresh()?;
        Ok(bundle)
    }

    /// Path of the PEM bundle, for building a TLS transport.
    #[must_use]
    pub fn cert_file(&self) -> &Path {
        &self.cert_file
    }

    /// Directory holding trust anchors and credentials.
    #[must_use]
    pub fn cert_dir(&self) -> &Path {
        &self.cert_dir
    }

    /// Status as of the last [`Self::open`] or [`Self::refresh`].
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// Re-reads bundle state from disk.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::open`].
    pub fn refresh(&mut self) -> Result<AuthStatus, AuthError> {
        self.status = if self.cert_file.is_file() {
            match self.read_metadata()? {
                Some(metadata) if metadata.not_after > now_epoch_secs() => AuthStatus::Valid,
                _ => AuthStatus::Expired,
            }
        } else {
            AuthStatus::Missing
        };
        debug!(status = ?self.status, path = %self.cert_file.display(), "credential status");
        Ok(self.status)
    }

    /// Records a renewed certificate's expiry in the sidecar.
    ///
    /// Called by the renewal collaborator after writing the PEM bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the sidecar cannot be written.
    pub fn record_renewal(&mut self, lifetime: Duration) -> Result<(), AuthError> {
        let metadata = CertMetadata {
            not_after: now_epoch_secs() + lifetime.as_secs(),
        };
        fs::create_dir_all(&self.cert_dir).map_err(|source| AuthError::Io {
            path: self.cert_dir.clone(),
            source,
        })?;
        let body = serde_json::to_string_pretty(&metadata).map_err(|source| {
            AuthError::Metadata {
                path: self.metadata_file.clone(),
                source,
            }
        })?;
        fs::write(&self.metadata_file, body).map_err(|source| AuthError::Io {
            path: self.metadata_file.clone(),
            source,
        })?;
        self.refresh()?;
        Ok(())
    }

    fn read_metadata(&self) -> Result<Option<CertMetadata>, AuthError> {
        let body = match fs::read_to_string(&self.metadata_file) {
            Ok(body) => body,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthError::Io {
                    path: self.metadata_file.clone(),
                    source,
                });
            }
        };
        let metadata = serde_json::from_str(&body).map_err(|source| AuthError::Metadata {
            path: self.metadata_file.clone(),
            source,
        })?;
        Ok(Some(metadata))
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_pem(root: &Path) {
        let dir = root.join(CERT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CREDENTIALS_FILE), "-----BEGIN CERTIFICATE-----\n").unwrap();
    }

    #[test]
    fn test_missing_bundle() {
        let root = TempDir::new().unwrap();
        let bundle = CertBundle::open(root.path()).unwrap();
        assert_eq!(bundle.status(), AuthStatus::Missing);
    }

    #[test]
    fn test_pem_without_metadata_is_expired() {
        let root = TempDir::new().unwrap();
        write_pem(root.path());
        let bundle = CertBundle::open(root.path()).unwrap();
        assert_eq!(bundle.status(), AuthStatus::Expired);
    }

    #[test]
    fn test_renewal_makes_bundle_valid() {
        let root = TempDir::new().unwrap();
        write_pem(root.path());
        let mut bundle = CertBundle::open(root.path()).unwrap();
        bundle.record_renewal(Duration::from_secs(3600)).unwrap();
        assert_eq!(bundle.status(), AuthStatus::Valid);
    }

    #[test]
    fn test_recorded_expiry_in_past_is_expired() {
        let root = TempDir::new().unwrap();
        write_pem(root.path());
        let dir = root.path().join(CERT_DIR);
        fs::write(dir.join(METADATA_FILE), r#"{"not_after": 1}"#).unwrap();
        let bundle = CertBundle::open(root.path()).unwrap();
        assert_eq!(bundle.status(), AuthStatus::Expired);
    }

    #[test]
    fn test_corrupt_metadata_is_an_error() {
        let root = TempDir::new().unwrap();
        write_pem(root.path());
        let dir = root.path().join(CERT_DIR);
        fs::write(dir.join(METADATA_FILE), "not json").unwrap();
        let result = CertBundle::open(root.path());
        assert!(matches!(result, Err(AuthError::Metadata { .. })));
    }

    #[test]
    fn test_refresh_tracks_deletion() {
        let root = TempDir::new().unwrap();
        write_pem(root.path());
        let mut bundle = CertBundle::open(root.path()).unwrap();
        assert_ne!(bundle.status(), AuthStatus::Missing);
        fs::remove_file(bundle.cert_file()).unwrap();
        assert_eq!(bundle.refresh().unwrap(), AuthStatus::Missing);
    }
}
