//! Application configuration
//!
//! All paths, timing constants and site-specific tables live here. The
//! configuration is built once during startup and passed by reference to
//! each component; nothing reads ambient global state after `load()`.

mod site;

pub use site::{KNOWN_HOSTS, SiteProfile, engine_for_label_class, status_for_label_text};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the data directory root.
pub const DATA_DIR_ENV: &str = "GAMEDEX_DATA_DIR";

/// Main configuration for catalog, crawl and vault operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root data directory. All other paths are derived from it.
    pub data_dir: PathBuf,
    /// Sqlite catalog database file.
    pub db_path: PathBuf,
    /// Encrypted session bundle.
    pub session_file: PathBuf,
    /// Random salt used by key derivation. Once created it must never be
    /// regenerated while a session file encrypted under it still exists.
    pub salt_file: PathBuf,
    /// Cache directory for listing thumbnails.
    pub thumbs_dir: PathBuf,
    /// Cache directory for detail-page header images.
    pub headers_dir: PathBuf,

    pub site: SiteProfile,

    /// Bounded wait for the content marker after navigation.
    pub content_wait_secs: u64,
    /// Delay between listing page fetches. This is a behavioural
    /// requirement against the live source, not a tunable optimisation.
    pub page_delay_ms: u64,
    /// Delay between per-item detail fetches.
    pub item_delay_ms: u64,
    /// Retry cap for transient detail-fetch failures.
    pub max_retries: u32,
    /// Base delay for the linear retry backoff.
    pub retry_delay_ms: u64,
    /// Premium accounts are rate limited less aggressively by the source.
    pub premium_account: bool,

    /// Download and cache thumbnails and header images locally.
    pub cache_images: bool,

    /// Default page bound for board listings.
    pub board_max_pages: u32,
    /// Default page bound for the saved-items listing.
    pub saved_max_pages: u32,

    pub headless: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl AppConfig {
    /// Build a configuration rooted at the given data directory without
    /// touching the filesystem.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            db_path: data_dir.join("catalog.db"),
            session_file: data_dir.join("session.enc"),
            salt_file: data_dir.join("salt.bin"),
            thumbs_dir: data_dir.join("thumbs"),
            headers_dir: data_dir.join("headers"),
            data_dir,
            site: SiteProfile::default(),
            content_wait_secs: 20,
            page_delay_ms: 2_000,
            item_delay_ms: 500,
            max_retries: 3,
            retry_delay_ms: 2_000,
            premium_account: false,
            cache_images: true,
            board_max_pages: 10,
            saved_max_pages: 50,
            headless: true,
        }
    }

    /// Resolve the data directory, build the configuration and create
    /// every directory it references.
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let config = Self::with_data_dir(data_dir);
        config.ensure_directories()?;
        Ok(config)
    }

    /// Create the data, thumbnail and header cache directories.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.thumbs_dir, &self.headers_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn content_wait(&self) -> Duration {
        Duration::from_secs(self.content_wait_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Delay between per-item detail fetches. Premium accounts are not
    /// throttled as hard by the source, so the delay is halved for them.
    pub fn item_delay(&self) -> Duration {
        if self.premium_account {
            Duration::from_millis(self.item_delay_ms / 2)
        } else {
            Duration::from_millis(self.item_delay_ms)
        }
    }

    /// Linearly growing backoff for the given zero-based attempt.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms * u64::from(attempt + 1))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gamedex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_follow_data_dir() {
        let config = AppConfig::with_data_dir(PathBuf::from("/tmp/gx"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/gx/catalog.db"));
        assert_eq!(config.session_file, PathBuf::from("/tmp/gx/session.enc"));
        assert_eq!(config.salt_file, PathBuf::from("/tmp/gx/salt.bin"));
    }

    #[test]
    fn premium_halves_item_delay() {
        let mut config = AppConfig::with_data_dir(PathBuf::from("/tmp/gx"));
        let normal = config.item_delay();
        config.premium_account = true;
        assert_eq!(config.item_delay(), normal / 2);
    }
}
