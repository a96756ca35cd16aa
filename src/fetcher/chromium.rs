//! CDP-backed page fetcher
//!
//! Owns a Chrome instance and a single page, and exposes them through the
//! `PageFetcher` capability. Launch flags and the handler-loop spawn
//! follow the usual chromiumoxide setup; known-benign CDP serialization
//! errors from the event stream are suppressed rather than logged as
//! failures.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, error, info, trace};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{FetchError, FetchResult, PageFetcher, WaitOutcome};
use crate::config::AppConfig;
use crate::vault::SessionCookie;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Poll cadence while waiting for a selector.
const WAIT_POLL: Duration = Duration::from_millis(250);

/// A launched browser with one page driven through the capability trait.
pub struct ChromiumFetcher {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumFetcher {
    /// Launch Chrome with the profile directory and headless setting from
    /// the configuration, spawn the CDP event loop and open a blank page.
    pub async fn launch(config: &AppConfig) -> FetchResult<Self> {
        let profile_dir: PathBuf = config.data_dir.join("browser_profile");
        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| FetchError::Browser(format!("cannot create profile dir: {e}")))?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(profile_dir.clone())
            .arg(format!("--user-agent={USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");

        if config.headless {
            builder = builder.headless_mode(HeadlessMode::default());
        } else {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("failed to build browser config: {e}")))?;

        info!("launching browser (headless: {})", config.headless);
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide cannot decode;
                    // they are not failures of our session.
                    let benign = msg.contains("data did not match any variant")
                        || msg.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("suppressed benign CDP error: {msg}");
                    } else {
                        error!("browser handler error: {msg}");
                    }
                }
            }
            debug!("browser handler loop finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("failed to open page: {e}")))?;

        // Best effort; the source blocks obvious automation.
        if let Err(e) = page
            .evaluate("Object.defineProperty(navigator, 'webdriver', {get: () => undefined})")
            .await
        {
            debug!("could not mask webdriver flag: {e}");
        }

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Close the browser and stop the event loop.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close reported: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            debug!("browser wait reported: {e}");
        }
        self.handler_task.abort();
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn navigate(&self, url: &str) -> FetchResult<()> {
        debug!("navigating to {url}");
        self.page
            .goto(url)
            .await
            .map_err(|e| FetchError::Navigation(format!("{url}: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| FetchError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn current_html(&self) -> FetchResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| FetchError::Browser(format!("failed to read page content: {e}")))
    }

    async fn cookies(&self) -> FetchResult<Vec<SessionCookie>> {
        let raw = self
            .page
            .get_cookies()
            .await
            .map_err(|e| FetchError::Browser(format!("failed to read cookies: {e}")))?;

        let mut cookies = Vec::with_capacity(raw.len());
        for cookie in raw {
            // The generated CDP types serialize to protocol-shaped JSON;
            // going through it keeps this independent of their field
            // wrappers.
            let value = serde_json::to_value(&cookie)
                .map_err(|e| FetchError::Browser(format!("cookie serialization: {e}")))?;
            cookies.push(SessionCookie {
                name: json_str(&value, "name"),
                value: json_str(&value, "value"),
                domain: json_str(&value, "domain"),
                path: json_str(&value, "path"),
                secure: value.get("secure").and_then(|v| v.as_bool()).unwrap_or(false),
                http_only: value
                    .get("httpOnly")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                expires: value.get("expires").and_then(|v| v.as_f64()),
                same_site: value
                    .get("sameSite")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            });
        }
        Ok(cookies)
    }

    async fn set_cookie(&self, cookie: &SessionCookie) -> FetchResult<()> {
        // Expiry and same-site are deliberately dropped on replay; the
        // source rejects stale values and a session cookie is enough.
        let mut builder = CookieParam::builder()
            .name(cookie.name.as_str())
            .value(cookie.value.as_str());
        if !cookie.domain.is_empty() {
            builder = builder.domain(cookie.domain.as_str());
        }
        if !cookie.path.is_empty() {
            builder = builder.path(cookie.path.as_str());
        }
        let param = builder
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build()
            .map_err(FetchError::CookieRejected)?;

        self.page
            .set_cookies(vec![param])
            .await
            .map_err(|e| FetchError::CookieRejected(format!("{}: {e}", cookie.name)))?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> FetchResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> FetchResult<WaitOutcome> {
        let start = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                debug!(
                    "selector {selector:?} appeared after {:.2}s",
                    start.elapsed().as_secs_f64()
                );
                return Ok(WaitOutcome::Found);
            }
            if start.elapsed() >= timeout {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}

fn json_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
