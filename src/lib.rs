//! gamedex: a local, queryable catalog of game threads published on a
//! forum that offers no stable API.
//!
//! Data is extracted from rendered HTML through a browser-backed page
//! fetcher, walked listing by listing under politeness and retry
//! discipline, normalized by layered field heuristics, and merged
//! idempotently into a sqlite catalog whose full-text index is kept
//! consistent by triggers. Re-authentication happens from an encrypted
//! session vault, so the master secret is all a user ever re-enters.

pub mod auth;
pub mod config;
pub mod extract;
pub mod fetcher;
pub mod runner;
pub mod storage;
pub mod sync;
pub mod vault;
pub mod walker;

pub use config::{AppConfig, SiteProfile};
pub use extract::{DownloadLink, ItemRecord, extract_thread_details, extract_thread_id};
pub use fetcher::{ChromiumFetcher, FetchError, PageFetcher, WaitOutcome};
pub use runner::{
    CrawlEvent, CrawlHandle, CrawlKind, CrawlReport, CrawlRequest, CrawlWorker, SyncedItem,
};
pub use storage::{Catalog, CatalogItem};
pub use sync::{ImageCache, SyncError, Synchronizer};
pub use vault::{SessionCookie, Vault, VaultError};
pub use walker::{CrawlCursor, ListingKind, ListingWalker, WalkOutcome, WalkReport};
