//! Description, changelog and tag extraction from thread detail pages.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::{collapsed_text, newline_text, sel};

const DESCRIPTION_CAP: usize = 5_000;
const CHANGELOG_CAP: usize = 3_000;
const TAG_CAP: usize = 20;
const TAG_TEXT_CAP: usize = 30;

static MESSAGE_BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".message-body .bbWrapper"));
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("h1, h2, h3, h4, b, strong"));
static TAG_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(r#".tagItem, [class*="tag"]"#));

static TAG_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)Tags?:\s*(.+?)(?:\n|$)", r"(?i)Genres?:\s*(.+?)(?:\n|$)"]
        .iter()
        .map(|p| Regex::new(p).expect("BUG: tag pattern is invalid"))
        .collect()
});

/// First-post description, newline preserved and capped.
pub fn extract_description(doc: &Html) -> String {
    let Some(body) = doc.select(&MESSAGE_BODY_SEL).next() else {
        debug!("no message body found for description");
        return String::new();
    };
    let mut description = newline_text(body);
    if description.chars().count() > DESCRIPTION_CAP {
        description = description.chars().take(DESCRIPTION_CAP).collect::<String>() + "...";
    }
    description
}

/// Changelog section: a heading containing "changelog", then following
/// siblings until the next heading.
pub fn extract_changelog(doc: &Html) -> String {
    for heading in doc.select(&HEADING_SEL) {
        let text = collapsed_text(heading).to_lowercase();
        if !text.contains("changelog") && !text.contains("change log") {
            continue;
        }

        let mut parts = Vec::new();
        for sibling in heading.next_siblings() {
            let Some(el) = ElementRef::wrap(sibling) else {
                continue;
            };
            if matches!(el.value().name(), "h1" | "h2" | "h3" | "h4") {
                break;
            }
            let part = newline_text(el);
            if !part.is_empty() {
                parts.push(part);
            }
        }

        if !parts.is_empty() {
            let joined = parts.join("\n");
            return joined.chars().take(CHANGELOG_CAP).collect();
        }
    }
    String::new()
}

/// Tags from `.tagItem` elements plus `Tags:`/`Genres:` lines in the
/// description. Deduplicated, individually length-capped and bounded.
pub fn extract_tags(doc: &Html, description: &str) -> Vec<String> {
    let mut tags = Vec::new();

    for tag_el in doc.select(&TAG_ITEM_SEL) {
        let text = collapsed_text(tag_el);
        if !text.is_empty() && text.chars().count() < TAG_TEXT_CAP {
            tags.push(text);
        }
    }

    for pattern in TAG_LINE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(description) {
            for tag in caps[1].split([',', '/', ';']) {
                let tag = tag.trim();
                if !tag.is_empty() {
                    tags.push(tag.to_string());
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    tags.retain(|t| seen.insert(t.clone()));
    tags.truncate(TAG_CAP);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_comes_from_first_post_body() {
        let doc = Html::parse_document(
            r#"<div class="message-body"><div class="bbWrapper">Line one
            <br>Line two</div></div>"#,
        );
        let description = extract_description(&doc);
        assert!(description.contains("Line one"));
        assert!(description.contains("Line two"));
    }

    #[test]
    fn changelog_stops_at_next_heading() {
        let doc = Html::parse_document(
            r#"<div><h3>Changelog</h3><p>v1.1 fixes</p><p>v1.0 initial</p>
               <h3>Download</h3><p>not this</p></div>"#,
        );
        let changelog = extract_changelog(&doc);
        assert!(changelog.contains("v1.1 fixes"));
        assert!(changelog.contains("v1.0 initial"));
        assert!(!changelog.contains("not this"));
    }

    #[test]
    fn tags_deduplicate_and_merge_sources() {
        let doc = Html::parse_document(
            r#"<span class="tagItem">rpg</span><span class="tagItem">rpg</span>"#,
        );
        let tags = extract_tags(&doc, "Tags: fantasy, rpg; adventure");
        assert!(tags.contains(&"rpg".to_string()));
        assert!(tags.contains(&"fantasy".to_string()));
        assert!(tags.contains(&"adventure".to_string()));
        assert_eq!(tags.iter().filter(|t| *t == "rpg").count(), 1);
    }
}
