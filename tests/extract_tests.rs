//! Field extraction against representative page fixtures.

mod common;

use common::{board_row, broken_board_row, listing_page, saved_row};
use gamedex::config::SiteProfile;
use gamedex::extract::{
    extract_thread_details, extract_version, next_page_url, parse_board_page, parse_saved_page,
};
use scraper::Html;

const THREAD_PAGE: &str = r#"<html>
<head><meta property="og:image" content="https://cdn.example.com/preview.jpg"></head>
<body>
<ul class="p-breadcrumbs">
    <li><a href="/"><span itemprop="name">Home</span></a></li>
    <li><a href="/forums/games.6/"><span itemprop="name">Games</span></a></li>
    <li><a href="/threads/my-game.777/"><span itemprop="name">My Game</span></a></li>
</ul>
<h1 class="p-title-value">[DevCo] My Game [v1.4.2]</h1>
<span class="label label--renpy">Ren'Py</span>
<span class="label">Ongoing</span>
<div class="message--post js-post">
    <div class="message-body"><div class="bbWrapper">
        A story about things.
        Developer: DevCo Studios
        Tags: fantasy, romance
    </div></div>
    <img src="https://cdn.example.com/shot1.jpg" class="bbImage">
    <img src="https://cdn.example.com/avatars/someone.png">
    <h3>Download</h3>
    <p><a href="https://mega.nz/file/abc123">Mega</a>
       <a href="https://pixeldrain.com/u/def">Pixeldrain mirror</a></p>
    <h3>Changelog</h3>
    <p>v1.4.2 fixed saves</p>
</div>
<span class="tagItem">fantasy</span>
</body></html>"#;

#[test]
fn thread_details_extracts_every_field() {
    let doc = Html::parse_document(THREAD_PAGE);
    let record = extract_thread_details(&doc, "https://example.com/threads/my-game.777/");

    assert_eq!(record.thread_id.as_deref(), Some("777"));
    assert_eq!(record.title.as_deref(), Some("[DevCo] My Game [v1.4.2]"));
    assert_eq!(record.version.as_deref(), Some("1.4.2"));
    assert_eq!(record.engine.as_deref(), Some("Ren'Py"));
    assert_eq!(record.status.as_deref(), Some("Ongoing"));
    // The explicit label in the overview outranks the title brackets.
    assert_eq!(record.developer.as_deref(), Some("DevCo Studios"));
    assert_eq!(record.category.as_deref(), Some("Games"));
    assert_eq!(record.forum_id.as_deref(), Some("6"));
    assert!(record
        .description
        .as_deref()
        .unwrap()
        .contains("A story about things."));
    assert!(record.changelog.as_deref().unwrap().contains("fixed saves"));
    assert!(record.tags.contains(&"fantasy".to_string()));
    assert!(record.tags.contains(&"romance".to_string()));

    // Preview image first, avatars excluded.
    assert_eq!(record.images[0], "https://cdn.example.com/preview.jpg");
    assert!(record.images.iter().any(|i| i.ends_with("shot1.jpg")));
    assert!(record.images.iter().all(|i| !i.contains("avatar")));

    let hosts: Vec<&str> = record.downloads.iter().map(|d| d.host.as_str()).collect();
    assert_eq!(hosts, vec!["Mega", "Pixeldrain"]);
}

#[test]
fn developer_and_version_from_title_brackets() {
    let doc = Html::parse_document("<html><body><h1 class=\"p-title-value\">[DevCo] My Game [v1.4.2]</h1></body></html>");
    let record = extract_thread_details(&doc, "https://example.com/threads/g.1/");
    assert_eq!(record.developer.as_deref(), Some("DevCo"));
    assert_eq!(record.version.as_deref(), Some("1.4.2"));
}

#[test]
fn terminal_state_version() {
    assert_eq!(extract_version("My Game [Final]"), "Final");
}

#[test]
fn board_page_yields_records_and_skips_broken_rows() {
    let site = SiteProfile::default();
    let rows = vec![
        board_row("[DevCo] Alpha [v0.1]", "/threads/alpha.100/"),
        broken_board_row(),
        board_row("Beta [Final]", "/threads/beta.200/"),
    ];
    let html = listing_page(&rows, None, false);
    let doc = Html::parse_document(&html);

    let records = parse_board_page(&doc, &site);
    assert_eq!(records.len(), 2);

    let alpha = &records[0];
    assert_eq!(alpha.thread_id.as_deref(), Some("100"));
    assert_eq!(alpha.version.as_deref(), Some("0.1"));
    assert_eq!(alpha.engine.as_deref(), Some("Ren'Py"));
    assert_eq!(alpha.status.as_deref(), Some("Ongoing"));
    assert_eq!(alpha.category.as_deref(), Some("Games"));
    assert_eq!(alpha.forum_id.as_deref(), Some("6"));
    assert_eq!(
        alpha.url.as_deref(),
        Some("https://lewdcorner.com/threads/alpha.100/")
    );
    assert_eq!(
        alpha.cover_image.as_deref(),
        Some("https://lewdcorner.com/data/thumb.jpg")
    );
    assert_eq!(alpha.last_update.as_deref(), Some("2024-05-01T10:00:00Z"));
}

#[test]
fn disallowed_forum_is_skipped_entirely() {
    let mut site = SiteProfile::default();
    site.allowed_forums = vec!["999".to_string()];
    let rows = vec![board_row("Alpha", "/threads/alpha.100/")];
    let html = listing_page(&rows, None, false);
    let doc = Html::parse_document(&html);

    assert!(parse_board_page(&doc, &site).is_empty());
}

#[test]
fn saved_page_marks_records_bookmarked() {
    let site = SiteProfile::default();
    let rows = vec![saved_row("[Dev] Saved Game [v2.0]", "/threads/saved.300/")];
    let html = listing_page(&rows, None, false);
    let doc = Html::parse_document(&html);

    let records = parse_saved_page(&doc, &site);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.is_bookmarked, Some(true));
    assert_eq!(record.thread_id.as_deref(), Some("300"));
    assert_eq!(record.version.as_deref(), Some("2.0"));
    assert_eq!(
        record.description.as_deref(),
        Some("A short preview snippet.")
    );
    assert_eq!(record.last_update.as_deref(), Some("2024-06-02T08:30:00Z"));
}

#[test]
fn saved_page_falls_back_to_struct_item_rows() {
    // Some theme versions render the saved listing with board markup.
    let site = SiteProfile::default();
    let rows = vec![board_row("[Dev] Old Theme [v0.3]", "/threads/old.400/")];
    let html = listing_page(&rows, None, false);
    let doc = Html::parse_document(&html);

    let records = parse_saved_page(&doc, &site);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].thread_id.as_deref(), Some("400"));
    assert_eq!(records[0].is_bookmarked, Some(true));
}

#[test]
fn next_page_detection() {
    let site = SiteProfile::default();

    let html = listing_page(&[], Some("/forums/games.6/page-2"), false);
    let doc = Html::parse_document(&html);
    assert_eq!(
        next_page_url(&doc, &site).as_deref(),
        Some("https://lewdcorner.com/forums/games.6/page-2")
    );

    // A disabled control ends pagination regardless of its href.
    let html = listing_page(&[], Some("/forums/games.6/page-2"), true);
    let doc = Html::parse_document(&html);
    assert_eq!(next_page_url(&doc, &site), None);

    let html = listing_page(&[], None, false);
    let doc = Html::parse_document(&html);
    assert_eq!(next_page_url(&doc, &site), None);
}
