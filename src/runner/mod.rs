//! Crawl runner
//!
//! The operation surface the CLI (or a GUI process) drives. A crawl is a
//! request sent to a spawned worker task; progress and completion come
//! back as events over a channel, and cancellation is a shared flag the
//! worker checks between pages and between items. Nothing here shares
//! mutable worker state with the caller.
//!
//! The whole pipeline is one logical worker: one listing at a time, one
//! page at a time, one detail fetch at a time. The bottleneck is a
//! single rate-limited authenticated browsing session, so internal
//! parallelism would only get the account throttled.

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use scraper::Html;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::extract::{
    DownloadLink, ItemRecord, extract_thread_details, parse_search_page,
};
use crate::fetcher::{PageFetcher, WaitOutcome};
use crate::storage::Catalog;
use crate::sync::{SyncError, Synchronizer};
use crate::vault::SessionCookie;
use crate::walker::{ListingKind, ListingWalker, WalkOutcome};

/// Which listing a crawl covers.
#[derive(Debug, Clone)]
pub enum CrawlKind {
    /// A board listing starting at the given URL.
    Board { url: String },
    /// The account's saved-items listing.
    SavedItems,
}

/// One crawl request, sent to a worker task.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub kind: CrawlKind,
    pub max_pages: u32,
    /// Fetch each item's detail page to fill in the fields listings do
    /// not carry (proper thumbnail, developer).
    pub enrich_details: bool,
}

/// Progress events published while a crawl runs.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    PageCrawled { page: u32, items: usize },
    ItemSynced { id: i64, title: String },
    ItemSkipped { title: String, reason: String },
    Finished { synced: usize, outcome: WalkOutcome },
}

/// Per-item summary returned to the caller after a crawl.
#[derive(Debug, Clone, Serialize)]
pub struct SyncedItem {
    pub id: i64,
    pub thread_id: Option<String>,
    pub url: Option<String>,
    pub title: String,
    pub version: Option<String>,
    pub developer: Option<String>,
}

/// Result of a finished crawl.
#[derive(Debug)]
pub struct CrawlReport {
    pub items: Vec<SyncedItem>,
    pub pages_fetched: u32,
    pub outcome: WalkOutcome,
}

/// Handle to a running crawl: the event stream, the stop flag and the
/// join handle for the final report.
pub struct CrawlHandle {
    pub events: mpsc::UnboundedReceiver<CrawlEvent>,
    pub stop: Arc<AtomicBool>,
    pub task: JoinHandle<Result<CrawlReport>>,
}

/// Owns everything a crawl task needs, so the task can be spawned with
/// no shared mutable state.
pub struct CrawlWorker {
    fetcher: Arc<dyn PageFetcher>,
    catalog: Catalog,
    config: AppConfig,
    cookies: Vec<SessionCookie>,
}

impl CrawlWorker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        catalog: Catalog,
        config: AppConfig,
        cookies: Vec<SessionCookie>,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            config,
            cookies,
        }
    }

    /// Spawn the crawl onto its own task and hand back the channel ends.
    pub fn spawn(self, request: CrawlRequest) -> CrawlHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let task = tokio::spawn(async move { self.run(request, tx, stop_flag).await });
        CrawlHandle {
            events: rx,
            stop,
            task,
        }
    }

    async fn run(
        self,
        request: CrawlRequest,
        events: mpsc::UnboundedSender<CrawlEvent>,
        stop: Arc<AtomicBool>,
    ) -> Result<CrawlReport> {
        let (kind, start_url) = match &request.kind {
            CrawlKind::Board { url } => (ListingKind::Board, url.clone()),
            CrawlKind::SavedItems => (
                ListingKind::SavedItems,
                self.config.site.bookmarks_url.clone(),
            ),
        };

        let walker = ListingWalker::new(self.fetcher.as_ref(), &self.config);
        let page_events = events.clone();
        let report = walker
            .walk(kind, &start_url, request.max_pages, &stop, |page, items| {
                let _ = page_events.send(CrawlEvent::PageCrawled {
                    page,
                    items: items.len(),
                });
            })
            .await;

        info!(
            "walk finished ({:?}): {} items over {} pages",
            report.outcome,
            report.items.len(),
            report.pages_fetched
        );

        let sync = Synchronizer::new(&self.catalog, &self.config)
            .with_cookies(self.cookies.clone());

        let mut synced = Vec::new();
        for mut record in report.items {
            if stop.load(Ordering::Relaxed) {
                info!("stop requested, ending sync after {} items", synced.len());
                break;
            }

            if request.enrich_details {
                self.enrich(&mut record).await;
                tokio::time::sleep(self.config.item_delay()).await;
            }

            sync.cache_cover(&mut record).await;

            let title = record.title.clone().unwrap_or_default();
            match sync.upsert(&record).await {
                Ok(id) => {
                    let _ = events.send(CrawlEvent::ItemSynced {
                        id,
                        title: title.clone(),
                    });
                    synced.push(SyncedItem {
                        id,
                        thread_id: record.thread_id.clone(),
                        url: record.url.clone(),
                        title,
                        version: record.version.clone(),
                        developer: record.developer.clone(),
                    });
                }
                Err(SyncError::InvalidRecord) => {
                    let _ = events.send(CrawlEvent::ItemSkipped {
                        title,
                        reason: "no usable identifier".to_string(),
                    });
                }
                Err(e @ SyncError::Storage(_)) => {
                    // Storage failures are fatal to the operation; there
                    // is no point pushing more records at a broken store.
                    return Err(anyhow!(e)).context("catalog write failed");
                }
            }
        }

        let _ = events.send(CrawlEvent::Finished {
            synced: synced.len(),
            outcome: report.outcome,
        });

        Ok(CrawlReport {
            items: synced,
            pages_fetched: report.pages_fetched,
            outcome: report.outcome,
        })
    }

    /// Visit the item's thread page and fill in what the listing row did
    /// not carry. Best effort: a failed enrichment keeps the listing
    /// fields.
    async fn enrich(&self, record: &mut ItemRecord) {
        let Some(url) = record.url.clone().filter(|u| !u.is_empty()) else {
            return;
        };
        debug!("enriching {url}");

        if let Err(e) = self.fetcher.navigate(&url).await {
            warn!("detail enrichment navigation failed for {url}: {e}");
            return;
        }
        match self
            .fetcher
            .wait_for(&self.config.site.detail_marker, self.config.content_wait())
            .await
        {
            Ok(WaitOutcome::Found) => {}
            Ok(WaitOutcome::TimedOut) | Err(_) => {
                warn!("detail enrichment timed out for {url}");
                return;
            }
        }
        let Ok(html) = self.fetcher.current_html().await else {
            return;
        };

        let detail = {
            let doc = Html::parse_document(&html);
            extract_thread_details(&doc, &url)
        };

        if !detail.images.is_empty() {
            record.images = detail.images;
            if let Some(first) = record.images.first() {
                record.cover_image = Some(first.clone());
            }
        }
        if let Some(dev) = detail
            .developer
            .filter(|d| !d.is_empty() && d != crate::extract::UNKNOWN)
        {
            record.developer = Some(dev);
        }
        if record.description.is_none() {
            record.description = detail.description.filter(|d| !d.is_empty());
        }
    }
}

/// Fetch and extract one thread's detail page, retrying failures with a
/// linearly growing backoff up to the configured cap.
pub async fn fetch_thread_details(
    fetcher: &dyn PageFetcher,
    config: &AppConfig,
    url: &str,
) -> Result<ItemRecord> {
    let mut last_error = String::new();
    for attempt in 0..config.max_retries.max(1) {
        if attempt > 0 {
            tokio::time::sleep(config.retry_delay(attempt - 1)).await;
        }
        info!("scraping thread details: {url} (attempt {})", attempt + 1);

        match try_fetch_details(fetcher, config, url).await {
            Ok(record) => return Ok(record),
            Err(e) => {
                warn!("detail fetch failed (attempt {}): {e}", attempt + 1);
                last_error = e.to_string();
            }
        }
    }
    Err(anyhow!("all retries exhausted for {url}: {last_error}"))
}

async fn try_fetch_details(
    fetcher: &dyn PageFetcher,
    config: &AppConfig,
    url: &str,
) -> Result<ItemRecord> {
    fetcher.navigate(url).await?;
    match fetcher
        .wait_for(&config.site.detail_marker, config.content_wait())
        .await?
    {
        WaitOutcome::Found => {}
        WaitOutcome::TimedOut => {
            return Err(anyhow!("timed out waiting for thread content"));
        }
    }
    let html = fetcher.current_html().await?;
    let record = {
        let doc = Html::parse_document(&html);
        extract_thread_details(&doc, url)
    };
    Ok(record)
}

/// Download links for one thread, without touching the catalog.
pub async fn fetch_download_links(
    fetcher: &dyn PageFetcher,
    config: &AppConfig,
    url: &str,
) -> Result<Vec<DownloadLink>> {
    let record = fetch_thread_details(fetcher, config, url).await?;
    Ok(record.downloads)
}

/// Run a site search and extract the result rows. Results are returned,
/// not synced; the caller decides what enters the catalog.
pub async fn site_search(
    fetcher: &dyn PageFetcher,
    config: &AppConfig,
    query: &str,
) -> Result<Vec<ItemRecord>> {
    let search_url = format!(
        "{}?q={}",
        config.site.search_url,
        urlencoding::encode(query)
    );
    fetcher.navigate(&search_url).await?;

    // A query with no hits renders no result rows; a timeout here just
    // means an empty result set.
    if fetcher
        .wait_for(&config.site.saved_marker, config.content_wait())
        .await?
        == WaitOutcome::TimedOut
    {
        debug!("no search result rows appeared for {query:?}");
    }

    let html = fetcher.current_html().await?;
    let records = {
        let doc = Html::parse_document(&html);
        parse_search_page(&doc, &config.site)
    };
    info!("site search for {query:?} returned {} rows", records.len());
    Ok(records)
}

/// Add or remove the source-side bookmark for a thread and mirror the
/// flag locally when the item is already cataloged.
pub async fn set_bookmark(
    fetcher: &dyn PageFetcher,
    catalog: &Catalog,
    config: &AppConfig,
    url: &str,
    bookmarked: bool,
) -> Result<()> {
    fetcher.navigate(url).await?;
    if fetcher
        .wait_for(&config.site.detail_marker, config.content_wait())
        .await?
        == WaitOutcome::TimedOut
    {
        return Err(anyhow!("timed out loading thread page"));
    }

    let script = format!(
        r#"(function() {{
            const link = document.querySelector('a.bookmarkLink');
            if (!link) return "missing";
            const active = link.classList.contains('is-bookmarked');
            if ({want} !== active) {{ link.click(); return "toggled"; }}
            return "unchanged";
        }})()"#,
        want = bookmarked,
    );
    let outcome = fetcher.run_script(&script).await?;
    match outcome.as_str() {
        Some("missing") => return Err(anyhow!("no bookmark control on this page")),
        Some("toggled") => {
            // Give the in-page request a moment to land before the
            // browser goes away.
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        _ => debug!("bookmark already in the requested state"),
    }

    let thread_id = crate::extract::extract_thread_id(url);
    let changed = catalog
        .set_bookmarked(thread_id.as_deref(), url, bookmarked)
        .await?;
    if !changed {
        debug!("thread not in local catalog yet, source-side flag only");
    }
    Ok(())
}
