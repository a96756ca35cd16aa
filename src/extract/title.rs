//! Version and developer heuristics over thread titles and descriptions.
//!
//! Titles on the source look like `"[Developer] Game Name [v1.2.3]"`,
//! `"Developer - Game Name [0.4]"`, `"Game Name [Final]"` and every
//! sloppy variation in between. Each heuristic is tried in a fixed order
//! and the first usable result wins.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

use super::{UNKNOWN, collapsed_text, sel};
use scraper::Selector;

/// Version patterns in priority order. Bracketed forms win over inline
/// forms; a bracketed terminal-state word is the last resort.
static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\[v\.?(\d+[\d.]*[a-zA-Z0-9]*)\]",
        r"(?i)\[(\d+\.[\d.]+[a-zA-Z0-9]*)\]",
        r"(?i)\bv\.?(\d+\.[\d.]+[a-zA-Z0-9]*)\b",
        r"(?i)version\s+(\d+\.[\d.]+[a-zA-Z0-9]*)",
        r"(?i)\[(Final|Completed|Complete)\]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("BUG: version pattern is invalid"))
    .collect()
});

/// Extract a version string from a thread title. First matching pattern
/// wins; no match yields the `"Unknown"` sentinel.
pub fn extract_version(title: &str) -> String {
    for pattern in VERSION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(title) {
            return caps[1].to_string();
        }
    }
    UNKNOWN.to_string()
}

/// Labels that introduce a developer name in freeform description text.
static DEV_LABEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Developer:\s*(.+?)(?:\n|<br|$)",
        r"(?i)Dev:\s*(.+?)(?:\n|<br|$)",
        r"(?i)Made\s+by:\s*(.+?)(?:\n|<br|$)",
        r"(?i)Creator:\s*(.+?)(?:\n|<br|$)",
        r"(?i)Author:\s*(.+?)(?:\n|<br|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("BUG: developer pattern is invalid"))
    .collect()
});

static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("BUG: tag pattern is invalid"));
static TRAILING_BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\[.*?\]$").expect("BUG: bracket pattern is invalid"));
static DASH_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^-\[]+?)\s*-\s*(.+)$").expect("BUG: dash pattern is invalid"));
static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]").expect("BUG: bracket pattern is invalid"));
static VERSIONISH_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?\d+\.").expect("BUG: versionish pattern is invalid"));
static VERSIONISH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?\d+[\d.]*").expect("BUG: versionish pattern is invalid"));

static DL_SEL: LazyLock<Selector> = LazyLock::new(|| sel("dl"));
static DT_SEL: LazyLock<Selector> = LazyLock::new(|| sel("dt"));
static DD_SEL: LazyLock<Selector> = LazyLock::new(|| sel("dd"));
static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| sel("strong, b"));

const DEV_KEYWORDS: &[&str] = &["developer", "dev", "creator", "author"];
const DEV_LABEL_KEYWORDS: &[&str] = &["developer:", "dev:", "creator:", "author:"];
const STATUS_WORDS: &[&str] = &[
    "final",
    "completed",
    "complete",
    "abandoned",
    "ongoing",
    "on hold",
];

fn usable(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (3..=99).contains(&len)
}

/// Extract the developer name. Tried in strict priority:
///
/// 1. an explicit label inside the freeform description text,
/// 2. structured key/value pairs or bold labels in the parsed document,
/// 3. a leading `"Developer - Title"` dash prefix, accepted only when it
///    is clearly a prefix and does not itself look like a version,
/// 4. bracketed title segments, first bracket preferred since the last
///    one is more often the version.
///
/// Each tier runs only when the previous produced nothing usable.
pub fn extract_developer(title: &str, description: &str, doc: Option<&Html>) -> String {
    if let Some(dev) = developer_from_description(description) {
        return dev;
    }
    if let Some(dev) = doc.and_then(developer_from_document) {
        return dev;
    }
    if let Some(dev) = developer_from_dash_prefix(title) {
        return dev;
    }
    if let Some(dev) = developer_from_brackets(title) {
        return dev;
    }
    UNKNOWN.to_string()
}

fn developer_from_description(description: &str) -> Option<String> {
    if description.is_empty() {
        return None;
    }
    for pattern in DEV_LABEL_PATTERNS.iter() {
        let Some(caps) = pattern.captures(description) else {
            continue;
        };
        let mut candidate = HTML_TAG_RE.replace_all(caps[1].trim(), "").to_string();
        candidate = candidate
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        candidate = TRAILING_BRACKET_RE.replace(&candidate, "").to_string();
        if usable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn developer_from_document(doc: &Html) -> Option<String> {
    // Definition lists are the common structured forum format.
    for dl in doc.select(&DL_SEL) {
        let (Some(dt), Some(dd)) = (dl.select(&DT_SEL).next(), dl.select(&DD_SEL).next()) else {
            continue;
        };
        let key = collapsed_text(dt).to_lowercase();
        if DEV_KEYWORDS.iter().any(|k| key.contains(k)) {
            let candidate = collapsed_text(dd);
            if usable(&candidate) {
                return Some(candidate);
            }
        }
    }

    // Bold label followed by a bare text node.
    for bold in doc.select(&BOLD_SEL) {
        let label = collapsed_text(bold).to_lowercase();
        if !DEV_LABEL_KEYWORDS.iter().any(|k| label.contains(k)) {
            continue;
        }
        for sibling in bold.next_siblings() {
            let Some(text) = sibling.value().as_text() else {
                break;
            };
            let candidate = text.trim().trim_start_matches(':').trim().to_string();
            if usable(&candidate) {
                return Some(candidate);
            }
            break;
        }
    }
    None
}

fn developer_from_dash_prefix(title: &str) -> Option<String> {
    let caps = DASH_PREFIX_RE.captures(title)?;
    let candidate = caps[1].trim().to_string();
    if VERSIONISH_DOT_RE.is_match(&candidate) {
        return None;
    }
    if !usable(&candidate) || candidate.chars().count() >= 50 {
        return None;
    }
    // A "prefix" longer than half the title is the title itself.
    if candidate.chars().count() * 2 >= title.chars().count() {
        debug!("dash prefix rejected as too long: {candidate:?}");
        return None;
    }
    Some(candidate)
}

fn developer_from_brackets(title: &str) -> Option<String> {
    let brackets: Vec<String> = BRACKET_RE
        .captures_iter(title)
        .map(|c| c[1].to_string())
        .collect();

    match brackets.len() {
        0 => None,
        1 => {
            // A lone bracket could be developer, version or status; only
            // accept it when it is clearly none of the latter two.
            let candidate = &brackets[0];
            if VERSIONISH_RE.is_match(candidate) {
                return None;
            }
            if STATUS_WORDS.contains(&candidate.to_lowercase().as_str()) {
                return None;
            }
            (usable(candidate) && candidate.chars().count() < 50).then(|| candidate.clone())
        }
        _ => {
            let candidate = &brackets[0];
            if VERSIONISH_RE.is_match(candidate) {
                return None;
            }
            usable(candidate).then(|| candidate.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_version_forms() {
        assert_eq!(extract_version("My Game [v1.0]"), "1.0");
        assert_eq!(extract_version("My Game [v.1.0]"), "1.0");
        assert_eq!(extract_version("My Game [1.0.1]"), "1.0.1");
        assert_eq!(extract_version("My Game [v0.1.2b]"), "0.1.2b");
    }

    #[test]
    fn inline_and_worded_version_forms() {
        assert_eq!(extract_version("My Game v1.5 release"), "1.5");
        assert_eq!(extract_version("My Game version 2.0.1"), "2.0.1");
    }

    #[test]
    fn terminal_state_words_as_version() {
        assert_eq!(extract_version("My Game [Final]"), "Final");
        assert_eq!(extract_version("My Game [completed]"), "completed");
        assert_eq!(extract_version("My Game"), UNKNOWN);
    }

    #[test]
    fn developer_from_description_label() {
        let dev = extract_developer("Title", "Overview\nDeveloper: StudioX\nMore", None);
        assert_eq!(dev, "StudioX");
    }

    #[test]
    fn developer_dash_prefix_must_be_short() {
        assert_eq!(extract_developer("DevCo - My Long Game Name", "", None), "DevCo");
        // Prefix over half the title length is the title, not a developer.
        assert_eq!(
            extract_developer("A Very Long Prefix Here - End", "", None),
            UNKNOWN
        );
    }

    #[test]
    fn developer_first_bracket_not_last() {
        assert_eq!(
            extract_developer("[DevCo] My Game [v1.4.2]", "", None),
            "DevCo"
        );
    }

    #[test]
    fn single_bracket_rejects_version_and_status() {
        assert_eq!(extract_developer("My Game [v1.4.2]", "", None), UNKNOWN);
        assert_eq!(extract_developer("My Game [Final]", "", None), UNKNOWN);
        assert_eq!(extract_developer("My Game [DevCo]", "", None), "DevCo");
    }
}
