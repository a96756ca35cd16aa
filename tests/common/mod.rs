//! Shared test helpers: a scripted page fetcher and HTML fixture
//! builders for the listing markup families.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use gamedex::config::AppConfig;
use gamedex::fetcher::{FetchError, FetchResult, PageFetcher, WaitOutcome};
use gamedex::vault::SessionCookie;

/// One scripted page keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub html: String,
    /// When set, waiting for any selector on this page times out.
    pub wait_times_out: bool,
}

/// A fetcher that serves pre-canned pages instead of driving a browser.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, ScriptedPage>>,
    current: Mutex<String>,
    pub visited: Mutex<Vec<String>>,
    pub cookies_set: Mutex<Vec<SessionCookie>>,
    pub reject_cookie_names: Vec<String>,
    pub stored_cookies: Vec<SessionCookie>,
    pub script_result: Option<serde_json::Value>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            ScriptedPage {
                html: html.to_string(),
                wait_times_out: false,
            },
        );
        self
    }

    pub fn timeout_page(self, url: &str, html: &str) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            ScriptedPage {
                html: html.to_string(),
                wait_times_out: true,
            },
        );
        self
    }

    pub fn visited_urls(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    fn current_page(&self) -> Option<ScriptedPage> {
        let current = self.current.lock().unwrap().clone();
        self.pages.lock().unwrap().get(&current).cloned()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn navigate(&self, url: &str) -> FetchResult<()> {
        self.visited.lock().unwrap().push(url.to_string());
        if !self.pages.lock().unwrap().contains_key(url) {
            return Err(FetchError::Navigation(format!("no scripted page for {url}")));
        }
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_html(&self) -> FetchResult<String> {
        self.current_page()
            .map(|p| p.html)
            .ok_or_else(|| FetchError::Browser("no current page".to_string()))
    }

    async fn cookies(&self) -> FetchResult<Vec<SessionCookie>> {
        Ok(self.stored_cookies.clone())
    }

    async fn set_cookie(&self, cookie: &SessionCookie) -> FetchResult<()> {
        if self.reject_cookie_names.contains(&cookie.name) {
            return Err(FetchError::CookieRejected(cookie.name.clone()));
        }
        self.cookies_set.lock().unwrap().push(cookie.clone());
        Ok(())
    }

    async fn run_script(&self, _script: &str) -> FetchResult<serde_json::Value> {
        Ok(self
            .script_result
            .clone()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for(&self, _selector: &str, _timeout: Duration) -> FetchResult<WaitOutcome> {
        match self.current_page() {
            Some(page) if page.wait_times_out => Ok(WaitOutcome::TimedOut),
            Some(_) => Ok(WaitOutcome::Found),
            None => Ok(WaitOutcome::TimedOut),
        }
    }
}

/// Config suitable for tests: temp data dir, no politeness delays.
pub fn test_config(data_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::with_data_dir(data_dir.to_path_buf());
    config.page_delay_ms = 1;
    config.item_delay_ms = 1;
    config.retry_delay_ms = 1;
    config.content_wait_secs = 1;
    config.cache_images = false;
    config
}

/// One board listing row in the source's structItem markup.
pub fn board_row(title: &str, href: &str) -> String {
    format!(
        r#"<div class="structItem structItem--thread">
            <div class="structItem-iconContainer"><img src="/data/thumb.jpg"></div>
            <div class="structItem-title"><a data-tp-primary="on" href="{href}">{title}</a></div>
            <span class="label label--renpy">Ren'Py</span>
            <span class="label">Ongoing</span>
            <time class="structItem-latestDate" datetime="2024-05-01T10:00:00Z">May 1</time>
        </div>"#
    )
}

/// A board row with no title link, which parsers must skip.
pub fn broken_board_row() -> String {
    r#"<div class="structItem"><div class="structItem-cell">advert</div></div>"#.to_string()
}

/// One saved-items row in the contentRow markup.
pub fn saved_row(title: &str, href: &str) -> String {
    format!(
        r#"<div class="contentRow contentRow--bookmark">
            <div class="contentRow-figure"><img src="/data/saved-thumb.jpg"></div>
            <div class="contentRow-main">
                <div class="contentRow-title"><a href="{href}">{title}</a></div>
                <div class="contentRow-snippet">A short preview snippet.</div>
                <time datetime="2024-06-02T08:30:00Z">Jun 2</time>
            </div>
        </div>"#
    )
}

/// Wrap rows into a full listing page with breadcrumbs and an optional
/// next-page control.
pub fn listing_page(rows: &[String], next_href: Option<&str>, next_disabled: bool) -> String {
    let next = match next_href {
        Some(href) if next_disabled => {
            format!(r#"<a class="pageNav-jump--next is-disabled" href="{href}">Next</a>"#)
        }
        Some(href) => format!(r#"<a class="pageNav-jump--next" href="{href}">Next</a>"#),
        None => String::new(),
    };
    format!(
        r#"<html><body>
        <ul class="p-breadcrumbs">
            <li><a href="/"><span itemprop="name">Home</span></a></li>
            <li><a href="/forums/games.6/"><span itemprop="name">Games</span></a></li>
        </ul>
        {rows}
        {next}
        </body></html>"#,
        rows = rows.join("\n"),
    )
}
