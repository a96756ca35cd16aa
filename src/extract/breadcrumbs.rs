//! Category and forum id from the breadcrumb trail.
//!
//! The last breadcrumb entry is the current thread, so the category is
//! the second-to-last; the forum id is the numeric suffix of a breadcrumb
//! link pointing at a forum listing (`/forums/games.6/`).

use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::{UNKNOWN, collapsed_text, sel};

static BREADCRUMB_LIST_SEL: LazyLock<Selector> = LazyLock::new(|| sel("ul.p-breadcrumbs"));
static BREADCRUMB_ITEM_SEL: LazyLock<Selector> = LazyLock::new(|| sel("li"));
static ITEMPROP_NAME_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"span[itemprop="name"]"#));
static ITEM_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| sel("a"));
static FORUM_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| sel(r#"a[href*="/forums/"]"#));

/// The breadcrumb entries in page order.
pub fn breadcrumb_trail(doc: &Html) -> Vec<String> {
    let Some(list) = doc.select(&BREADCRUMB_LIST_SEL).next() else {
        return Vec::new();
    };

    let mut trail = Vec::new();
    for item in list.select(&BREADCRUMB_ITEM_SEL) {
        let text = match item.select(&ITEMPROP_NAME_SEL).next() {
            Some(name) => collapsed_text(name),
            None => item
                .select(&ITEM_LINK_SEL)
                .next()
                .map(collapsed_text)
                .unwrap_or_default(),
        };
        if !text.is_empty() {
            trail.push(text);
        }
    }
    trail
}

/// Category name: the second-to-last breadcrumb, since the last entry is
/// the thread itself.
pub fn category_from_breadcrumbs(doc: &Html) -> String {
    let trail = breadcrumb_trail(doc);
    match trail.len() {
        0 => UNKNOWN.to_string(),
        1 => trail[0].clone(),
        n => trail[n - 2].clone(),
    }
}

/// Numeric forum id from the first breadcrumb link whose target matches
/// the forum listing URL pattern.
pub fn forum_id_from_breadcrumbs(doc: &Html) -> Option<String> {
    let list = doc.select(&BREADCRUMB_LIST_SEL).next()?;
    for link in list.select(&FORUM_LINK_SEL) {
        let href = link.value().attr("href").unwrap_or_default();
        let Some((_, forum_part)) = href.split_once("/forums/") else {
            continue;
        };
        let forum_part = forum_part.trim_end_matches('/');
        if let Some(id) = forum_part.split('.').nth(1)
            && !id.is_empty()
        {
            return Some(id.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREADCRUMBS: &str = r#"
        <ul class="p-breadcrumbs">
            <li><a href="/"><span itemprop="name">Home</span></a></li>
            <li><a href="/forums/games.6/"><span itemprop="name">Games</span></a></li>
            <li><a href="/threads/my-game.123/"><span itemprop="name">My Game</span></a></li>
        </ul>"#;

    #[test]
    fn category_is_second_to_last() {
        let doc = Html::parse_document(BREADCRUMBS);
        assert_eq!(category_from_breadcrumbs(&doc), "Games");
    }

    #[test]
    fn forum_id_from_listing_link() {
        let doc = Html::parse_document(BREADCRUMBS);
        assert_eq!(forum_id_from_breadcrumbs(&doc), Some("6".to_string()));
    }

    #[test]
    fn missing_breadcrumbs_degrade() {
        let doc = Html::parse_document("<p>nothing</p>");
        assert_eq!(category_from_breadcrumbs(&doc), UNKNOWN);
        assert_eq!(forum_id_from_breadcrumbs(&doc), None);
        assert!(breadcrumb_trail(&doc).is_empty());
    }

    #[test]
    fn single_breadcrumb_is_the_category() {
        let doc = Html::parse_document(
            r#"<ul class="p-breadcrumbs"><li><a href="/x">Only</a></li></ul>"#,
        );
        assert_eq!(category_from_breadcrumbs(&doc), "Only");
    }
}
