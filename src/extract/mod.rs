//! Field extraction
//!
//! Pure, per-document functions that turn inconsistently structured forum
//! HTML into typed fields. Every extractor is best effort: malformed
//! input degrades a single field to its sentinel (`"Unknown"`, empty
//! list) and never aborts extraction of the rest. Layered heuristics are
//! ordered lists of pure functions evaluated until the first success, so
//! each tier stays independently testable.

mod breadcrumbs;
mod content;
mod labels;
mod listing;
mod media;
mod title;

pub use breadcrumbs::{breadcrumb_trail, category_from_breadcrumbs, forum_id_from_breadcrumbs};
pub use content::{extract_changelog, extract_description, extract_tags};
pub use labels::{engine_from_labels, status_from_labels};
pub use listing::{
    current_username, next_page_url, parse_board_page, parse_saved_page, parse_search_page,
};
pub use media::{extract_download_links, extract_images, identify_host};
pub use title::{extract_developer, extract_version};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Sentinel for fields no heuristic could determine.
pub const UNKNOWN: &str = "Unknown";

/// One extracted download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    /// Canonical host label from the known-host table.
    pub host: String,
    pub url: String,
    /// Link text, falling back to the host label.
    pub label: String,
}

/// Normalized output of the field extractor for one item, before merge.
///
/// `None` means the source never yielded the field; the synchronizer
/// leaves stored values untouched for absent fields. Sentinels like
/// `"Unknown"` are present values and merge like any other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub thread_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub version: Option<String>,
    pub engine: Option<String>,
    pub status: Option<String>,
    pub developer: Option<String>,
    pub description: Option<String>,
    pub changelog: Option<String>,
    /// Remote thumbnail URL until cached, then the local cache path.
    pub cover_image: Option<String>,
    /// Local cache path of the detail-page header image.
    pub header_image: Option<String>,
    pub category: Option<String>,
    pub forum_id: Option<String>,
    /// Opaque freshness token from the source (a timestamp string).
    pub last_update: Option<String>,
    pub is_bookmarked: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub downloads: Vec<DownloadLink>,
}

impl ItemRecord {
    /// A record with neither a thread id nor a URL cannot be resolved
    /// against storage and must be rejected, not stored.
    pub fn has_identifier(&self) -> bool {
        self.thread_id.as_deref().is_some_and(|t| !t.is_empty())
            || self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

static THREAD_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/threads/[^/]+\.(\d+)").expect("BUG: thread id pattern is invalid")
});

/// Parse the stable numeric thread identifier from a canonical detail
/// URL (`.../threads/name.12345/`). Listing links do not always carry
/// it; resolution then falls back to the URL in the synchronizer.
pub fn extract_thread_id(url: &str) -> Option<String> {
    THREAD_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

static PAGE_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| sel("h1.p-title-value"));

/// Extract every field of a thread detail page into one record.
pub fn extract_thread_details(doc: &Html, url: &str) -> ItemRecord {
    let title = doc
        .select(&PAGE_TITLE_SEL)
        .next()
        .map(|el| collapsed_text(el))
        .unwrap_or_default();

    let description = extract_description(doc);
    let developer = extract_developer(&title, &description, Some(doc));

    ItemRecord {
        thread_id: extract_thread_id(url),
        url: Some(url.to_string()),
        title: Some(title.clone()),
        version: Some(extract_version(&title)),
        engine: Some(engine_from_labels(doc)),
        status: Some(status_from_labels(doc)),
        developer: Some(developer),
        description: Some(description.clone()),
        changelog: Some(extract_changelog(doc)),
        tags: extract_tags(doc, &description),
        images: extract_images(doc),
        downloads: extract_download_links(doc),
        category: Some(category_from_breadcrumbs(doc)),
        forum_id: forum_id_from_breadcrumbs(doc),
        ..Default::default()
    }
}

/// Parse a hardcoded selector. Only ever called with literals; a failure
/// is a bug in this crate, not in the input.
pub(crate) fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("BUG: hardcoded CSS selector is invalid")
}

/// All text of an element with runs of whitespace collapsed to single
/// spaces, the way the source renders it.
pub(crate) fn collapsed_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for piece in el.text() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(piece);
    }
    out
}

/// Element text with block boundaries preserved as newlines.
pub(crate) fn newline_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join a possibly relative href against the site base.
pub(crate) fn absolutize(base: &str, href: &str) -> String {
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}
