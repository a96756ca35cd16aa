//! Listing walker
//!
//! Drives pagination over one listing source: fetch a page, wait for its
//! content marker, extract the visible items, find the next-page control,
//! repeat. The source never exposes a total page count, so termination
//! relies on the explicit next control (absent or disabled), a same-URL
//! loop guard against malformed markup, and a caller-supplied page bound
//! that ends the walk even if the detection logic misfires.
//!
//! A timeout on one page aborts the walk and yields whatever was already
//! collected; it does not retry the same page. A fixed politeness delay
//! separates page fetches; removing it changes observable behaviour
//! against the live source.

use log::{debug, info, warn};
use scraper::Html;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::AppConfig;
use crate::extract::{ItemRecord, next_page_url, parse_board_page, parse_saved_page};
use crate::fetcher::{PageFetcher, WaitOutcome};

/// Which listing family a walk covers. The two families paginate the same
/// way but render items with different markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// A forum board listing.
    Board,
    /// The account's saved-items listing.
    SavedItems,
}

/// Per-listing pagination state. Created at the start of a run, mutated
/// after each page fetch, discarded at run end; walks always restart from
/// the listing's canonical first page.
#[derive(Debug, Clone)]
pub struct CrawlCursor {
    pub current_url: String,
    pub page_number: u32,
    pub source_kind: ListingKind,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Pagination ended cleanly (no next control, disabled control, or
    /// the same-URL guard fired).
    Completed,
    /// The caller-supplied page bound stopped the walk.
    PageLimit,
    /// A page timed out or failed; collected items are still yielded.
    Aborted,
    /// The cooperative stop flag was raised between pages.
    Stopped,
}

/// Result of one walk: the extracted records plus how it ended.
#[derive(Debug)]
pub struct WalkReport {
    pub items: Vec<ItemRecord>,
    pub pages_fetched: u32,
    pub outcome: WalkOutcome,
}

/// Walks one listing source through a page fetcher.
pub struct ListingWalker<'a> {
    fetcher: &'a dyn PageFetcher,
    config: &'a AppConfig,
}

impl<'a> ListingWalker<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, config: &'a AppConfig) -> Self {
        Self { fetcher, config }
    }

    /// Walk the listing starting at `start_url`, visiting at most
    /// `max_pages` pages. `on_page` is invoked once per extracted page.
    pub async fn walk(
        &self,
        kind: ListingKind,
        start_url: &str,
        max_pages: u32,
        stop: &Arc<AtomicBool>,
        mut on_page: impl FnMut(u32, &[ItemRecord]),
    ) -> WalkReport {
        let mut cursor = CrawlCursor {
            current_url: start_url.to_string(),
            page_number: 1,
            source_kind: kind,
        };
        let mut items = Vec::new();
        let mut pages_fetched = 0;

        let marker = match kind {
            ListingKind::Board => self.config.site.listing_marker.as_str(),
            ListingKind::SavedItems => self.config.site.saved_marker.as_str(),
        };

        let outcome = loop {
            if stop.load(Ordering::Relaxed) {
                info!("stop requested, ending walk after {pages_fetched} pages");
                break WalkOutcome::Stopped;
            }
            if cursor.page_number > max_pages {
                info!("page bound of {max_pages} reached");
                break WalkOutcome::PageLimit;
            }

            debug!(
                "fetching page {} of {:?} listing: {}",
                cursor.page_number, cursor.source_kind, cursor.current_url
            );

            if let Err(e) = self.fetcher.navigate(&cursor.current_url).await {
                warn!("page {} failed to load: {e}", cursor.page_number);
                break WalkOutcome::Aborted;
            }

            match self.fetcher.wait_for(marker, self.config.content_wait()).await {
                Ok(WaitOutcome::Found) => {}
                Ok(WaitOutcome::TimedOut) => {
                    warn!(
                        "timeout waiting for content on page {}",
                        cursor.page_number
                    );
                    break WalkOutcome::Aborted;
                }
                Err(e) => {
                    warn!("wait failed on page {}: {e}", cursor.page_number);
                    break WalkOutcome::Aborted;
                }
            }

            let html = match self.fetcher.current_html().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to read page {}: {e}", cursor.page_number);
                    break WalkOutcome::Aborted;
                }
            };

            // Parse inside a block so the document is gone before the
            // politeness sleep; the parsed tree is not Send.
            let (records, next_url) = {
                let doc = Html::parse_document(&html);
                let records = match kind {
                    ListingKind::Board => parse_board_page(&doc, &self.config.site),
                    ListingKind::SavedItems => parse_saved_page(&doc, &self.config.site),
                };
                (records, next_page_url(&doc, &self.config.site))
            };

            pages_fetched += 1;
            info!(
                "page {}: {} items extracted",
                cursor.page_number,
                records.len()
            );
            on_page(cursor.page_number, &records);
            items.extend(records);

            let Some(next_url) = next_url else {
                info!("no further pages after page {}", cursor.page_number);
                break WalkOutcome::Completed;
            };
            if next_url == cursor.current_url {
                // Malformed markup can point "next" at the current page;
                // treat the loop as the end of the listing.
                debug!("next page resolves to the current URL, ending walk");
                break WalkOutcome::Completed;
            }

            cursor.current_url = next_url;
            cursor.page_number += 1;

            tokio::time::sleep(self.config.page_delay()).await;
        };

        WalkReport {
            items,
            pages_fetched,
            outcome,
        }
    }
}
