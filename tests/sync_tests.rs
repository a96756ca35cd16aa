//! Synchronizer and catalog behaviour: dedup, merge precedence and the
//! search index staying in step with row changes.

mod common;

use common::test_config;
use gamedex::extract::ItemRecord;
use gamedex::storage::Catalog;
use gamedex::sync::{ImageCache, SyncError, Synchronizer};
use tempfile::TempDir;

fn record(thread_id: &str) -> ItemRecord {
    ItemRecord {
        thread_id: Some(thread_id.to_string()),
        url: Some(format!("https://lewdcorner.com/threads/game.{thread_id}/")),
        title: Some("[DevCo] Fixture Game [v1.0]".to_string()),
        version: Some("1.0".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn upsert_twice_yields_one_item() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let id1 = sync.upsert(&record("100")).await.unwrap();
    let id2 = sync.upsert(&record("100")).await.unwrap();

    assert_eq!(id1, id2);
    assert_eq!(catalog.item_count().await.unwrap(), 1);
}

#[tokio::test]
async fn merge_keeps_fields_the_other_call_wrote() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut first = ItemRecord::default();
    first.thread_id = Some("200".to_string());
    first.title = Some("Merge Game".to_string());
    first.version = Some("1.2".to_string());
    let id = sync.upsert(&first).await.unwrap();

    let mut second = ItemRecord::default();
    second.thread_id = Some("200".to_string());
    second.developer = Some("X".to_string());
    assert_eq!(sync.upsert(&second).await.unwrap(), id);

    let item = catalog.get(id).await.unwrap().unwrap();
    assert_eq!(item.version.as_deref(), Some("1.2"));
    assert_eq!(item.developer.as_deref(), Some("X"));
    assert_eq!(item.title, "Merge Game");
}

#[tokio::test]
async fn url_resolution_when_thread_id_is_absent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut by_url = ItemRecord::default();
    by_url.url = Some("https://lewdcorner.com/threads/odd-link/".to_string());
    by_url.title = Some("No Numeric Id".to_string());
    let id1 = sync.upsert(&by_url).await.unwrap();
    let id2 = sync.upsert(&by_url).await.unwrap();
    assert_eq!(id1, id2);
}

#[tokio::test]
async fn record_without_identifier_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut invalid = ItemRecord::default();
    invalid.title = Some("Orphan".to_string());
    let result = sync.upsert(&invalid).await;
    assert!(matches!(result, Err(SyncError::InvalidRecord)));
    assert_eq!(catalog.item_count().await.unwrap(), 0);
}

#[tokio::test]
async fn search_index_reflects_insert_update_and_delete_immediately() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut rec = ItemRecord::default();
    rec.thread_id = Some("300".to_string());
    rec.title = Some("Starlight Chronicle".to_string());
    rec.description = Some("a tale of moonbeams".to_string());
    let id = sync.upsert(&rec).await.unwrap();

    let hits = catalog.full_text_search("moonbeams").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);

    // Update replaces the indexed text in the same operation.
    let mut update = ItemRecord::default();
    update.thread_id = Some("300".to_string());
    update.description = Some("a tale of sunrays".to_string());
    sync.upsert(&update).await.unwrap();

    assert!(catalog.full_text_search("moonbeams").await.unwrap().is_empty());
    assert_eq!(catalog.full_text_search("sunrays").await.unwrap().len(), 1);
    assert_eq!(
        catalog.full_text_search("Starlight").await.unwrap().len(),
        1
    );

    catalog.delete(id).await.unwrap();
    assert!(catalog.full_text_search("sunrays").await.unwrap().is_empty());
}

#[tokio::test]
async fn tags_are_written_after_the_row_and_replaced_on_merge() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut rec = record("400");
    rec.tags = vec!["fantasy".to_string(), "rpg".to_string()];
    let id = sync.upsert(&rec).await.unwrap();
    assert_eq!(
        catalog.tags_for(id).await.unwrap(),
        vec!["fantasy".to_string(), "rpg".to_string()]
    );

    rec.tags = vec!["rpg".to_string(), "sandbox".to_string()];
    sync.upsert(&rec).await.unwrap();
    assert_eq!(
        catalog.tags_for(id).await.unwrap(),
        vec!["rpg".to_string(), "sandbox".to_string()]
    );
}

#[tokio::test]
async fn bookmark_flag_survives_merges_that_do_not_mention_it() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let mut rec = record("500");
    rec.is_bookmarked = Some(true);
    let id = sync.upsert(&rec).await.unwrap();

    let mut update = ItemRecord::default();
    update.thread_id = Some("500".to_string());
    update.version = Some("1.1".to_string());
    sync.upsert(&update).await.unwrap();

    let item = catalog.get(id).await.unwrap().unwrap();
    assert!(item.is_bookmarked);
    assert_eq!(item.version.as_deref(), Some("1.1"));
}

#[tokio::test]
async fn set_bookmarked_resolves_by_thread_id_or_url() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let catalog = Catalog::open_in_memory().await.unwrap();
    let sync = Synchronizer::new(&catalog, &config);

    let rec = record("600");
    let id = sync.upsert(&rec).await.unwrap();

    assert!(catalog.set_bookmarked(Some("600"), "", true).await.unwrap());
    assert!(catalog.get(id).await.unwrap().unwrap().is_bookmarked);

    assert!(
        catalog
            .set_bookmarked(None, rec.url.as_deref().unwrap(), false)
            .await
            .unwrap()
    );
    assert!(!catalog.get(id).await.unwrap().unwrap().is_bookmarked);

    assert!(!catalog.set_bookmarked(Some("nope"), "", true).await.unwrap());
}

#[tokio::test]
async fn image_cache_downloads_once_and_reuses_the_file() {
    let dir = TempDir::new().unwrap();
    let thumbs = dir.path().join("thumbs");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/thumb.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(vec![0xFF, 0xD8, 0xFF, 0xE0])
        .expect(1)
        .create_async()
        .await;

    let cache = ImageCache::new(server.url());
    let image_url = format!("{}/thumb.jpg", server.url());

    let first = cache
        .fetch(&thumbs, &image_url, "ctx", &[])
        .await
        .unwrap()
        .unwrap();
    assert!(first.exists());

    // The second fetch must be served from disk, not the network.
    let second = cache
        .fetch(&thumbs, &image_url, "ctx", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
    mock.assert_async().await;
}

#[tokio::test]
async fn image_cache_rejects_non_image_content() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/page.html")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html></html>")
        .create_async()
        .await;

    let cache = ImageCache::new(server.url());
    let url = format!("{}/page.html", server.url());
    let result = cache.fetch(dir.path(), &url, "ctx", &[]).await;
    assert!(result.is_err());
}
