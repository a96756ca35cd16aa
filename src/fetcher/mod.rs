//! Page fetcher capability
//!
//! The crawl pipeline never talks to a browser directly; it drives this
//! trait. One real implementation exists (`ChromiumFetcher`, a CDP-backed
//! adapter) and tests script their own. A single fetcher instance holds a
//! single rate-limited authenticated session and must not be driven by
//! two callers at once.

pub mod chromium;

pub use chromium::ChromiumFetcher;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::vault::SessionCookie;

/// Errors from the page fetcher boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser error: {0}")]
    Browser(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script execution failed: {0}")]
    Script(String),
    #[error("cookie rejected: {0}")]
    CookieRejected(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    /// Whether retrying the same operation has a reasonable chance of
    /// succeeding. Classified from the message, the way CDP surfaces
    /// network-level failures.
    pub fn is_transient(&self) -> bool {
        let msg = match self {
            Self::Browser(m) | Self::Navigation(m) => m.to_lowercase(),
            Self::Script(_) | Self::CookieRejected(_) => return false,
        };
        msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection reset")
            || msg.contains("connection refused")
            || msg.contains("network")
    }
}

/// Result of waiting for a selector to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The selector matched within the allotted time.
    Found,
    /// The wait expired without a match.
    TimedOut,
}

/// Capability object over an authenticated browsing context.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate the context to the given URL and wait for the load to
    /// settle.
    async fn navigate(&self, url: &str) -> FetchResult<()>;

    /// The fully rendered HTML of the current page.
    async fn current_html(&self) -> FetchResult<String>;

    /// All cookies visible to the current browsing context.
    async fn cookies(&self) -> FetchResult<Vec<SessionCookie>>;

    /// Install one cookie. Failures are per-cookie and non-fatal; callers
    /// replaying a bundle log and continue.
    async fn set_cookie(&self, cookie: &SessionCookie) -> FetchResult<()>;

    /// Evaluate a script in the page and return its JSON value.
    async fn run_script(&self, script: &str) -> FetchResult<serde_json::Value>;

    /// Wait until a selector matches, bounded by `timeout`. Expiry is an
    /// outcome, not an error.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> FetchResult<WaitOutcome>;
}
