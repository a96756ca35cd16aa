//! Encrypted session vault
//!
//! Persists the authenticated browsing session's cookies encrypted at
//! rest. The encryption key is either the master secret itself (when it
//! already is a valid url-safe base64 key) or derived from it with
//! PBKDF2-HMAC-SHA256 over a random salt persisted next to the session
//! file. Decryption failure is reported as `InvalidCredential`, distinct
//! from `NotFound`: "no session" and "wrong password" call for different
//! user actions and must never be conflated.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use fernet::Fernet;
use log::{debug, info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// PBKDF2 iteration count for key derivation.
const KDF_ITERATIONS: u32 = 100_000;
/// Derived key length in bytes, before base64 encoding.
const KEY_LEN: usize = 32;
/// Salt file length in bytes.
const SALT_LEN: usize = 32;
/// Length of a url-safe base64 encoding of a 32-byte key.
const ENCODED_KEY_LEN: usize = 44;

/// Errors raised by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No session file exists. Callers should offer a fresh login.
    #[error("no saved session")]
    NotFound,
    /// The session file exists but does not decrypt under the supplied
    /// secret. Callers should prompt for the master secret again.
    #[error("master secret does not match the saved session")]
    InvalidCredential,
    /// The decrypted payload is not a valid cookie bundle.
    #[error("session file contains an invalid cookie bundle: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("vault io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// One cookie captured from an authenticated browsing context. The fields
/// mirror what the page fetcher reports; everything beyond name and value
/// is carried so a later replay can reconstruct the session faithfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: String::new(),
            secure: false,
            http_only: false,
            expires: None,
            same_site: None,
        }
    }
}

/// Encrypted-at-rest store for session cookies.
#[derive(Debug, Clone)]
pub struct Vault {
    session_file: PathBuf,
    salt_file: PathBuf,
}

impl Vault {
    pub fn new(session_file: impl Into<PathBuf>, salt_file: impl Into<PathBuf>) -> Self {
        Self {
            session_file: session_file.into(),
            salt_file: salt_file.into(),
        }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(&config.session_file, &config.salt_file)
    }

    /// Whether a session file exists on disk. Says nothing about whether
    /// it decrypts.
    pub fn session_exists(&self) -> bool {
        self.session_file.exists()
    }

    /// Derive the encryption key for the given master secret.
    ///
    /// A secret that is already a valid 44-character url-safe base64 key
    /// is used as-is. Anything else is stretched with PBKDF2 over the
    /// persisted salt; the result is deterministic for a given secret and
    /// salt pair. Creating the salt on first use is the only side effect.
    pub fn derive_key(&self, secret: &str) -> VaultResult<String> {
        if secret.len() == ENCODED_KEY_LEN && Fernet::new(secret).is_some() {
            debug!("master secret is already a valid key, using as-is");
            return Ok(secret.to_string());
        }

        let salt = self.get_or_create_salt()?;
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), &salt, KDF_ITERATIONS, &mut key);
        Ok(URL_SAFE.encode(key))
    }

    /// Serialize and encrypt the cookie bundle, then write it atomically.
    pub fn save_session(&self, cookies: &[SessionCookie], secret: &str) -> VaultResult<()> {
        if cookies.is_empty() || cookies.iter().any(|c| c.name.is_empty()) {
            warn!("refusing to save an invalid cookie bundle");
            return Err(VaultError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cookie bundle is empty or contains unnamed cookies",
            )));
        }

        let key = self.derive_key(secret)?;
        let fernet = Fernet::new(&key).ok_or(VaultError::InvalidCredential)?;

        let payload = serde_json::to_vec_pretty(cookies)?;
        let token = fernet.encrypt(&payload);

        write_atomic(&self.session_file, token.as_bytes())?;
        info!("saved {} cookies to encrypted session file", cookies.len());
        Ok(())
    }

    /// Decrypt and deserialize the cookie bundle.
    pub fn load_session(&self, secret: &str) -> VaultResult<Vec<SessionCookie>> {
        if !self.session_file.exists() {
            debug!("session file does not exist");
            return Err(VaultError::NotFound);
        }

        let key = self.derive_key(secret)?;
        let fernet = Fernet::new(&key).ok_or(VaultError::InvalidCredential)?;

        let token = std::fs::read_to_string(&self.session_file)?;
        let payload = fernet
            .decrypt(token.trim())
            .map_err(|_| VaultError::InvalidCredential)?;

        let cookies: Vec<SessionCookie> = serde_json::from_slice(&payload)?;
        info!("loaded {} cookies from encrypted session file", cookies.len());
        Ok(cookies)
    }

    /// Remove the session file. Idempotent: a missing file is not an
    /// error. The salt file is left in place.
    pub fn delete_session(&self) -> VaultResult<()> {
        match std::fs::remove_file(&self.session_file) {
            Ok(()) => {
                info!("session file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Io(e)),
        }
    }

    fn get_or_create_salt(&self) -> VaultResult<Vec<u8>> {
        if self.salt_file.exists() {
            return Ok(std::fs::read(&self.salt_file)?);
        }
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        write_atomic(&self.salt_file, &salt)?;
        info!("created new salt file");
        Ok(salt.to_vec())
    }
}

/// Write to a sibling temp file and rename into place, so a crash mid-save
/// cannot leave a half-written file behind.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}
