//! Content-addressed image cache.
//!
//! Cache filenames hash the image URL together with a context string
//! (typically the owning item's URL), so the same image referenced from
//! two different items caches separately and a renamed remote cannot
//! collide with an existing entry. Skipping the download when the file
//! already exists is load-bearing: every sync revisits the same
//! thumbnails and must not refetch them.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128;

use crate::vault::SessionCookie;

#[derive(Debug, Error)]
pub enum ImageCacheError {
    #[error("image request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url does not serve an image: {0}")]
    NotAnImage(String),
    #[error("image cache io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads remote images into a local cache directory, keyed by
/// content-stable filenames.
pub struct ImageCache {
    client: reqwest::Client,
    base_url: String,
}

impl ImageCache {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// The cache path an image URL maps to within `dir`. Stable for a
    /// given URL and context pair.
    pub fn cache_path(&self, dir: &Path, url: &str, context: &str) -> PathBuf {
        let digest = xxh3_128(format!("{url}{context}").as_bytes());
        dir.join(format!("{}.jpg", hex::encode(digest.to_be_bytes())))
    }

    /// Fetch `url` into `dir` unless it is already cached, carrying the
    /// session's cookies so gated thumbnails resolve. Returns the local
    /// path, or `None` for an empty URL.
    pub async fn fetch(
        &self,
        dir: &Path,
        url: &str,
        context: &str,
        cookies: &[SessionCookie],
    ) -> Result<Option<PathBuf>, ImageCacheError> {
        if url.is_empty() {
            return Ok(None);
        }
        let absolute = crate::extract::absolutize(&self.base_url, url);
        let path = self.cache_path(dir, &absolute, context);

        if path.exists() {
            debug!("image already cached: {}", path.display());
            return Ok(Some(path));
        }

        let mut request = self.client.get(&absolute);
        if !cookies.is_empty() {
            let header = cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(reqwest::header::COOKIE, header);
        }

        let response = request.send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("image") {
            warn!("skipping non-image content at {absolute} ({content_type})");
            return Err(ImageCacheError::NotAnImage(absolute));
        }

        let bytes = response.bytes().await?;
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, &bytes)?;
        debug!("cached image {} ({} bytes)", path.display(), bytes.len());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_stable_and_context_sensitive() {
        let cache = ImageCache::new("https://example.com");
        let dir = Path::new("/tmp/thumbs");
        let a = cache.cache_path(dir, "https://cdn.example.com/x.jpg", "ctx1");
        let b = cache.cache_path(dir, "https://cdn.example.com/x.jpg", "ctx1");
        let c = cache.cache_path(dir, "https://cdn.example.com/x.jpg", "ctx2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.extension().is_some_and(|e| e == "jpg"));
    }
}
