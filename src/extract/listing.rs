//! Listing page parsers: board listings, the saved-items listing and
//! site search results.
//!
//! The three page families render thread summaries with different markup
//! (`.structItem` rows on boards, `.contentRow` rows on saved-items and
//! search pages), so each gets its own parser; the field heuristics are
//! shared. Items that fail to yield a minimum viable record (no title or
//! link) are skipped and logged, never fatal.

use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::{
    ItemRecord, absolutize, category_from_breadcrumbs, collapsed_text, extract_thread_id,
    extract_version, forum_id_from_breadcrumbs, sel,
};
use crate::config::{SiteProfile, engine_for_label_class};

static BOARD_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".structItem--thread, .structItem"));
static BOARD_TITLE_PRIMARY_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".structItem-title a[data-tp-primary]"));
static BOARD_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".structItem-title a"));
static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".label"));
static BOARD_THUMB_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".structItem-iconContainer img, .contentRow-figure img"));
static BOARD_TIME_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("time.structItem-latestDate"));

static SAVED_BOOKMARK_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".contentRow.contentRow--bookmark"));
static SAVED_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".contentRow"));
static SAVED_STRUCT_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".structItem"));
static SAVED_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".contentRow-title a, .structItem-title a"));
static SAVED_THUMB_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".contentRow-figure img, .structItem-iconContainer img"));
static SAVED_SNIPPET_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".contentRow-snippet, .structItem-minor"));
static SAVED_TIME_SEL: LazyLock<Selector> = LazyLock::new(|| sel("time, .u-dt"));

static NEXT_PAGE_SEL: LazyLock<Selector> = LazyLock::new(|| sel("a.pageNav-jump--next"));

static USERNAME_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".p-navgroup-link--user .p-navgroup-linkText",
        ".username",
        "[data-user-id]",
    ]
    .iter()
    .map(|s| sel(s))
    .collect()
});

/// Status words the source renders as plain label text on listing rows.
const BOARD_STATUS_WORDS: &[&str] = &["Completed", "Ongoing", "Abandoned", "On Hold"];
const SAVED_STATUS_WORDS: &[&str] =
    &["Completed", "Ongoing", "Abandoned", "On Hold", "On-Hold"];

/// Parse one board listing page into item records. Returns an empty list
/// when breadcrumbs resolve to a forum the profile does not allow.
pub fn parse_board_page(doc: &Html, site: &SiteProfile) -> Vec<ItemRecord> {
    let category = category_from_breadcrumbs(doc);
    let forum_id = forum_id_from_breadcrumbs(doc);

    if let Some(ref id) = forum_id
        && !site.is_allowed_forum(id)
    {
        info!("skipping non-allowed forum {id}");
        return Vec::new();
    }

    let mut records = Vec::new();
    let items: Vec<_> = doc.select(&BOARD_ITEM_SEL).collect();
    debug!("found {} thread rows on board page", items.len());

    for item in items {
        match parse_board_item(item, &category, forum_id.as_deref(), site) {
            Some(record) => records.push(record),
            None => warn!("skipping board row without title or link"),
        }
    }
    records
}

fn parse_board_item(
    item: ElementRef<'_>,
    category: &str,
    forum_id: Option<&str>,
    site: &SiteProfile,
) -> Option<ItemRecord> {
    let title_el = item
        .select(&BOARD_TITLE_PRIMARY_SEL)
        .next()
        .or_else(|| item.select(&BOARD_TITLE_SEL).next())?;

    let title = collapsed_text(title_el);
    let url = absolutize(&site.base_url, title_el.value().attr("href").unwrap_or_default());
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let labels: Vec<ElementRef<'_>> = item.select(&LABEL_SEL).collect();

    Some(ItemRecord {
        thread_id: extract_thread_id(&url),
        title: Some(title.clone()),
        url: Some(url),
        version: Some(extract_version(&title)),
        engine: Some(engine_from_item_labels(&labels)),
        status: Some(status_from_item_labels(&labels, BOARD_STATUS_WORDS)),
        cover_image: thumbnail(item, &BOARD_THUMB_SEL, site),
        category: Some(category.to_string()),
        forum_id: forum_id.map(str::to_string),
        last_update: freshness_marker(item, &BOARD_TIME_SEL),
        ..Default::default()
    })
}

/// Parse one saved-items page. The markup differs per theme version, so
/// the row selector falls back through three known structures.
pub fn parse_saved_page(doc: &Html, site: &SiteProfile) -> Vec<ItemRecord> {
    let mut rows: Vec<_> = doc.select(&SAVED_BOOKMARK_SEL).collect();
    if rows.is_empty() {
        rows = doc.select(&SAVED_ROW_SEL).collect();
    }
    if rows.is_empty() {
        rows = doc.select(&SAVED_STRUCT_SEL).collect();
    }
    debug!("found {} saved-item rows", rows.len());

    let mut records = Vec::new();
    for row in rows {
        match parse_saved_item(row, site) {
            Some(mut record) => {
                record.is_bookmarked = Some(true);
                records.push(record);
            }
            None => warn!("skipping saved-item row without title or link"),
        }
    }
    records
}

/// Parse site search results. Search result rows share the saved-items
/// markup family, minus the bookmark flag.
pub fn parse_search_page(doc: &Html, site: &SiteProfile) -> Vec<ItemRecord> {
    let mut rows: Vec<_> = doc.select(&SAVED_ROW_SEL).collect();
    if rows.is_empty() {
        rows = doc.select(&SAVED_STRUCT_SEL).collect();
    }

    let mut records = Vec::new();
    for row in rows {
        if let Some(record) = parse_saved_item(row, site) {
            records.push(record);
        }
    }
    records
}

fn parse_saved_item(item: ElementRef<'_>, site: &SiteProfile) -> Option<ItemRecord> {
    let title_el = item.select(&SAVED_TITLE_SEL).next()?;
    let title = collapsed_text(title_el);
    let url = absolutize(&site.base_url, title_el.value().attr("href").unwrap_or_default());
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let labels: Vec<ElementRef<'_>> = item.select(&LABEL_SEL).collect();

    let description = item
        .select(&SAVED_SNIPPET_SEL)
        .next()
        .map(collapsed_text)
        .filter(|s| !s.is_empty());

    Some(ItemRecord {
        thread_id: extract_thread_id(&url),
        title: Some(title.clone()),
        url: Some(url),
        version: Some(extract_version(&title)),
        engine: Some(engine_from_item_labels(&labels)),
        status: Some(status_from_item_labels(&labels, SAVED_STATUS_WORDS)),
        cover_image: thumbnail(item, &SAVED_THUMB_SEL, site),
        description,
        last_update: freshness_marker(item, &SAVED_TIME_SEL),
        ..Default::default()
    })
}

/// Resolve the next-page URL, or `None` when pagination ends: the control
/// is absent, or present but marked disabled. The source never reports a
/// total page count, so this is the only forward signal.
pub fn next_page_url(doc: &Html, site: &SiteProfile) -> Option<String> {
    let next = doc.select(&NEXT_PAGE_SEL).next()?;
    if next.value().classes().any(|c| c == "is-disabled") {
        return None;
    }
    let href = next.value().attr("href").unwrap_or_default();
    if href.is_empty() {
        return None;
    }
    Some(absolutize(&site.base_url, href))
}

/// Username of the logged-in account, from a rendered page. Selector
/// fallback list; used to verify a restored session is actually live.
pub fn current_username(doc: &Html) -> Option<String> {
    for selector in USERNAME_SELECTORS.iter() {
        if let Some(el) = doc.select(selector).next() {
            let name = collapsed_text(el);
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

fn engine_from_item_labels(labels: &[ElementRef<'_>]) -> String {
    for label in labels {
        for class in label.value().classes() {
            if class.starts_with("label--")
                && let Some(engine) = engine_for_label_class(class)
            {
                return engine.to_string();
            }
        }
    }
    super::UNKNOWN.to_string()
}

fn status_from_item_labels(labels: &[ElementRef<'_>], words: &[&str]) -> String {
    for label in labels {
        let text = collapsed_text(*label);
        if words.contains(&text.as_str()) {
            return text;
        }
    }
    super::UNKNOWN.to_string()
}

fn thumbnail(
    item: ElementRef<'_>,
    selector: &Selector,
    site: &SiteProfile,
) -> Option<String> {
    let img = item.select(selector).next()?;
    let src = img
        .value()
        .attr("src")
        .or_else(|| img.value().attr("data-src"))?;
    if src.is_empty() {
        return None;
    }
    Some(absolutize(&site.base_url, src))
}

fn freshness_marker(item: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let time_el = item.select(selector).next()?;
    time_el
        .value()
        .attr("datetime")
        .or_else(|| time_el.value().attr("title"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}
