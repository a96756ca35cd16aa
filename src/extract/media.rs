//! Image and download-link extraction.
//!
//! Images come from the main content block with avatar, reaction and
//! smiley graphics excluded; a page-level preview meta tag outranks
//! everything found inline. Download links are collected in two passes,
//! first the links under download headings, then a full-document sweep
//! against the known host table.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{DownloadLink, collapsed_text, sel};
use crate::config::KNOWN_HOSTS;

const IMAGE_CAP: usize = 10;

/// Substrings marking images that are chrome, not content.
const EXCLUDED_IMAGE_MARKERS: &[&str] = &["avatar", "smiley", "emoji", "icon", "rating"];

const DOWNLOAD_KEYWORDS: &[&str] = &["download", "mirror", "links", "get the game"];

static FIRST_POST_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".message--post.js-post"));
static POST_IMG_SEL: LazyLock<Selector> = LazyLock::new(|| sel("img.bbImage, img[src]"));
static BODY_IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(".message-body img.bbImage, .message-body img[src]"));
static OG_IMAGE_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"meta[property="og:image"]"#));
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("h1, h2, h3, h4, b, strong"));
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));

/// Collect content images in first-seen order, preview image first,
/// capped to a bounded count.
pub fn extract_images(doc: &Html) -> Vec<String> {
    let mut images = Vec::new();

    let post_images: Vec<ElementRef<'_>> = match doc.select(&FIRST_POST_SEL).next() {
        Some(first_post) => first_post.select(&POST_IMG_SEL).collect(),
        None => doc.select(&BODY_IMG_SEL).collect(),
    };

    for img in post_images {
        let src = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .or_else(|| img.value().attr("data-url"));
        let Some(src) = src else { continue };
        let lower = src.to_lowercase();
        if EXCLUDED_IMAGE_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        images.push(src.to_string());
    }

    // The preview meta tag is the page's own choice and the most
    // authoritative one.
    if let Some(meta) = doc.select(&OG_IMAGE_SEL).next()
        && let Some(content) = meta.value().attr("content")
        && !content.is_empty()
    {
        images.insert(0, content.to_string());
    }

    let mut seen = HashSet::new();
    images.retain(|img| seen.insert(img.clone()));
    images.truncate(IMAGE_CAP);
    images
}

/// Map a URL to a canonical host label when it belongs to a known file
/// host.
pub fn identify_host(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    KNOWN_HOSTS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, name)| *name)
}

/// Collect download links: links under download headings first, then a
/// full-document sweep against the known host table, deduplicated by URL
/// in that order.
pub fn extract_download_links(doc: &Html) -> Vec<DownloadLink> {
    let mut downloads = Vec::new();

    for heading in doc.select(&HEADING_SEL) {
        let text = collapsed_text(heading).to_lowercase();
        if !DOWNLOAD_KEYWORDS.iter().any(|k| text.contains(k)) {
            continue;
        }
        for block in siblings_until_heading(*heading) {
            for link in block.select(&ANCHOR_SEL) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                if let Some(host) = identify_host(href) {
                    downloads.push(make_link(host, href, link));
                }
            }
        }
    }

    for link in doc.select(&ANCHOR_SEL) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(host) = identify_host(href) {
            downloads.push(make_link(host, href, link));
        }
    }

    let mut seen = HashSet::new();
    downloads.retain(|d| seen.insert(d.url.clone()));
    downloads
}

fn make_link(host: &str, href: &str, link: ElementRef<'_>) -> DownloadLink {
    let text = collapsed_text(link);
    DownloadLink {
        host: host.to_string(),
        url: href.to_string(),
        label: if text.is_empty() {
            host.to_string()
        } else {
            text
        },
    }
}

/// Elements following `start` up to, and not including, the next section
/// heading.
fn siblings_until_heading<'a>(start: NodeRef<'a, Node>) -> Vec<ElementRef<'a>> {
    let mut blocks = Vec::new();
    for sibling in start.next_siblings() {
        let Some(el) = ElementRef::wrap(sibling) else {
            continue;
        };
        if matches!(el.value().name(), "h1" | "h2" | "h3" | "h4") {
            break;
        }
        blocks.push(el);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_exclude_chrome_and_prepend_preview() {
        let doc = Html::parse_document(
            r#"<head><meta property="og:image" content="https://cdn.example.com/preview.jpg"></head>
            <body><div class="message-body">
                <img src="https://cdn.example.com/shot1.jpg">
                <img src="https://cdn.example.com/avatars/u1.png">
                <img src="https://cdn.example.com/smiley-wink.gif">
                <img src="https://cdn.example.com/shot1.jpg">
                <img data-src="https://cdn.example.com/shot2.jpg" class="bbImage">
            </div></body>"#,
        );
        let images = extract_images(&doc);
        assert_eq!(images[0], "https://cdn.example.com/preview.jpg");
        assert!(images.contains(&"https://cdn.example.com/shot1.jpg".to_string()));
        assert!(images.iter().all(|i| !i.contains("avatar")));
        assert!(images.iter().all(|i| !i.contains("smiley")));
        assert_eq!(
            images
                .iter()
                .filter(|i| i.ends_with("shot1.jpg"))
                .count(),
            1
        );
    }

    #[test]
    fn image_cap_is_enforced() {
        let mut html = String::from(r#"<div class="message-body">"#);
        for i in 0..15 {
            html.push_str(&format!(r#"<img src="https://cdn.example.com/{i}.jpg">"#));
        }
        html.push_str("</div>");
        let doc = Html::parse_document(&html);
        assert_eq!(extract_images(&doc).len(), 10);
    }

    #[test]
    fn download_links_two_passes_dedupe() {
        let doc = Html::parse_document(
            r#"<div>
                <h3>Download</h3>
                <p><a href="https://mega.nz/file/abc">Mega mirror</a></p>
                <h3>Other</h3>
                <p><a href="https://pixeldrain.com/u/xyz">PD</a>
                   <a href="https://mega.nz/file/abc">dup</a>
                   <a href="https://example.com/not-a-host">nope</a></p>
            </div>"#,
        );
        let links = extract_download_links(&doc);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].host, "Mega");
        assert_eq!(links[0].label, "Mega mirror");
        assert_eq!(links[1].host, "Pixeldrain");
    }

    #[test]
    fn host_table_lookup() {
        assert_eq!(identify_host("https://GOFILE.io/d/x"), Some("GoFile"));
        assert_eq!(identify_host("https://example.com/x"), None);
    }
}
