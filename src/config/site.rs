//! Site profile: URLs, selectors and label tables for the one source this
//! tool understands. These are data, not a plugin surface; the markup they
//! describe is specific to the target forum software.

use serde::{Deserialize, Serialize};

/// URLs and markup markers for the target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub base_url: String,
    pub login_url: String,
    pub bookmarks_url: String,
    pub search_url: String,
    /// Forum ids the board scan is allowed to walk.
    pub allowed_forums: Vec<String>,
    /// Marker that must appear before a listing page is read.
    pub listing_marker: String,
    /// Marker that must appear before a saved-items page is read.
    pub saved_marker: String,
    /// Marker that must appear before a thread detail page is read.
    pub detail_marker: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let base = "https://lewdcorner.com";
        Self {
            base_url: base.to_string(),
            login_url: format!("{base}/login/"),
            bookmarks_url: format!("{base}/account/bookmarks"),
            search_url: format!("{base}/search/"),
            allowed_forums: vec!["6".into(), "119".into(), "110".into()],
            listing_marker: ".structItem--thread, .structItem".to_string(),
            saved_marker: ".contentRow, .structItem".to_string(),
            detail_marker: ".message-body, .p-title".to_string(),
        }
    }
}

impl SiteProfile {
    /// Whether a forum id parsed from breadcrumbs may be cataloged.
    pub fn is_allowed_forum(&self, forum_id: &str) -> bool {
        self.allowed_forums.iter().any(|f| f == forum_id)
    }
}

/// Engine names keyed by the CSS class the source puts on thread labels.
const ENGINE_LABELS: &[(&str, &str)] = &[
    ("label--renpy", "Ren'Py"),
    ("label--unity", "Unity"),
    ("label--rpgm", "RPG Maker"),
    ("label--html", "HTML"),
    ("label--unreal", "Unreal Engine"),
    ("label--flash", "Flash"),
    ("label--java", "Java"),
    ("label--others", "Others"),
    ("label--qsp", "QSP"),
    ("label--rags", "RAGS"),
    ("label--tads", "TADS"),
    ("label--adrift", "Adrift"),
    ("label--twine", "Twine"),
    ("label--wolf", "Wolf RPG"),
];

/// Canonical status names keyed by the label text the source renders.
const STATUS_LABELS: &[&str] = &["Completed", "Ongoing", "On Hold", "Abandoned"];

/// Map a label CSS class to a canonical engine name. Exact match only;
/// the source emits these classes verbatim.
pub fn engine_for_label_class(class: &str) -> Option<&'static str> {
    ENGINE_LABELS
        .iter()
        .find(|(key, _)| *key == class)
        .map(|(_, name)| *name)
}

/// Map label text to a canonical status name. Exact match first, then a
/// case-insensitive pass for sloppily cased labels.
pub fn status_for_label_text(text: &str) -> Option<&'static str> {
    if let Some(status) = STATUS_LABELS.iter().find(|s| **s == text) {
        return Some(status);
    }
    STATUS_LABELS
        .iter()
        .find(|s| s.eq_ignore_ascii_case(text))
        .copied()
}

/// Known file-hosting domains mapped to canonical host labels.
pub const KNOWN_HOSTS: &[(&str, &str)] = &[
    ("mega.nz", "Mega"),
    ("gofile.io", "GoFile"),
    ("pixeldrain.com", "Pixeldrain"),
    ("workupload.com", "WorkUpload"),
    ("anonfiles.com", "AnonFiles"),
    ("mediafire.com", "MediaFire"),
    ("drive.google.com", "Google Drive"),
    ("uploadhaven.com", "UploadHaven"),
    ("mixdrop.co", "Mixdrop"),
    ("krakenfiles.com", "KrakenFiles"),
    ("dropbox.com", "Dropbox"),
];
