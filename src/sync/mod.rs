//! Synchronizer
//!
//! Resolves extracted records against the catalog and performs
//! insert-or-merge without ever creating duplicates: thread id first, URL
//! second, and a record with neither is rejected outright. Each upsert is
//! one storage transaction; the FTS triggers fire inside it, so the
//! search index reflects the post-merge state the moment the transaction
//! commits. Image caching happens before the write so the stored cover
//! path points at a local file.

mod images;

pub use images::{ImageCache, ImageCacheError};

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::AppConfig;
use crate::extract::ItemRecord;
use crate::storage::Catalog;
use crate::vault::SessionCookie;

/// Errors from the synchronization layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The record has neither a thread id nor a URL; it cannot be
    /// resolved and is dropped, never stored.
    #[error("record has no usable identifier")]
    InvalidRecord,
    /// A storage write failed. Fatal to the current operation; the
    /// transaction rolls back, there is no partial commit.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Merges extracted records into the catalog.
pub struct Synchronizer<'a> {
    catalog: &'a Catalog,
    images: ImageCache,
    config: &'a AppConfig,
    /// Session cookies forwarded to image downloads.
    cookies: Vec<SessionCookie>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a AppConfig) -> Self {
        Self {
            catalog,
            images: ImageCache::new(config.site.base_url.clone()),
            config,
            cookies: Vec::new(),
        }
    }

    /// Attach session cookies for image downloads.
    pub fn with_cookies(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Insert or merge one record, returning the catalog row id.
    ///
    /// Merge rule: every present, non-empty field of the record
    /// overwrites the stored field; absent fields are left untouched and
    /// `last_synced` is refreshed either way.
    pub async fn upsert(&self, record: &ItemRecord) -> SyncResult<i64> {
        if !record.has_identifier() {
            warn!(
                "dropping record without identifier: {:?}",
                record.title.as_deref().unwrap_or("<untitled>")
            );
            return Err(SyncError::InvalidRecord);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.catalog.begin().await?;

        let existing = self
            .catalog
            .resolve_id(&mut tx, record.thread_id.as_deref(), record.url.as_deref())
            .await?;

        let id = match existing {
            Some(id) => {
                debug!("merging record into existing item {id}");
                self.catalog.update(&mut tx, id, record, &now).await?;
                id
            }
            None => {
                let id = self.catalog.insert(&mut tx, record, &now).await?;
                debug!("inserted new catalog item {id}");
                id
            }
        };

        // Tag relations need the row to exist first.
        if !record.tags.is_empty() {
            self.catalog.replace_tags(&mut tx, id, &record.tags).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Cache the record's cover image locally and rewrite the field to
    /// the cache path. A failed download degrades the field and is never
    /// fatal to the sync.
    pub async fn cache_cover(&self, record: &mut ItemRecord) {
        if !self.config.cache_images {
            return;
        }
        let Some(cover) = record.cover_image.clone().filter(|c| !c.is_empty()) else {
            return;
        };
        if cover.starts_with('/') || !cover.contains("://") {
            // Already a local cache path from an earlier sync.
            return;
        }
        let context = record.url.clone().unwrap_or_default();
        match self
            .images
            .fetch(&self.config.thumbs_dir, &cover, &context, &self.cookies)
            .await
        {
            Ok(Some(path)) => record.cover_image = Some(path.display().to_string()),
            Ok(None) => {}
            Err(e) => {
                info!("cover image download failed, keeping field empty: {e}");
                record.cover_image = None;
            }
        }
    }

    /// Cache the first detail-page image as the item's header image.
    /// Returns the local path when one was cached.
    pub async fn cache_header(&self, record: &ItemRecord) -> Option<String> {
        if !self.config.cache_images {
            return None;
        }
        let header_url = record.images.first()?.clone();
        let context = record.url.clone().unwrap_or_default();
        match self
            .images
            .fetch(&self.config.headers_dir, &header_url, &context, &self.cookies)
            .await
        {
            Ok(Some(path)) => Some(path.display().to_string()),
            Ok(None) => None,
            Err(e) => {
                info!("header image download failed: {e}");
                None
            }
        }
    }
}
