// Command-line surface for external callers (a GUI process drives these
// operations as subprocesses). Every operation takes positional
// arguments, prints machine-readable JSON on stdout on success and
// human-readable diagnostics on stderr, and exits 0 on success, 1 on any
// failure. Callers must treat the exit code as the success signal.

use anyhow::{Context, Result, anyhow, bail};
use log::info;
use std::sync::Arc;

use gamedex::auth;
use gamedex::config::AppConfig;
use gamedex::fetcher::ChromiumFetcher;
use gamedex::PageFetcher;
use gamedex::runner::{self, CrawlEvent, CrawlKind, CrawlRequest, CrawlWorker};
use gamedex::storage::Catalog;
use gamedex::sync::Synchronizer;
use gamedex::vault::Vault;

fn usage() -> String {
    [
        "usage: gamedex <command> [args...]",
        "",
        "  fetch-bookmarks <headless> <master-secret> [premium]",
        "  scan-forum <forum-url> <headless> <master-secret> [premium] [max-pages]",
        "  fetch-thread-details <url> <headless> <master-secret> [premium]",
        "  fetch-download-links <url> <headless> <master-secret> [premium]",
        "  search <query> <headless> <master-secret> [premium]",
        "  search-local <query>",
        "  add-bookmark <url> <headless> <master-secret> [premium]",
        "  remove-bookmark <url> <headless> <master-secret> [premium]",
        "  login <username> <password> <headless> <master-secret>",
        "  logout",
    ]
    .join("\n")
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!("{}", usage());
    };
    let rest = &args[1..];

    match command {
        "fetch-bookmarks" => {
            let headless = parse_bool(arg(rest, 0, "headless")?)?;
            let secret = arg(rest, 1, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(2));
            crawl(CrawlKindArg::Saved, headless, &secret, premium, None).await
        }
        "scan-forum" => {
            let url = arg(rest, 0, "forum-url")?.to_string();
            let headless = parse_bool(arg(rest, 1, "headless")?)?;
            let secret = arg(rest, 2, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(3));
            let max_pages = rest
                .get(4)
                .map(|p| p.parse::<u32>().context("max-pages must be a number"))
                .transpose()?;
            crawl(CrawlKindArg::Board(url), headless, &secret, premium, max_pages).await
        }
        "fetch-thread-details" => {
            let url = arg(rest, 0, "url")?.to_string();
            let headless = parse_bool(arg(rest, 1, "headless")?)?;
            let secret = arg(rest, 2, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(3));
            thread_details(&url, headless, &secret, premium).await
        }
        "fetch-download-links" => {
            let url = arg(rest, 0, "url")?.to_string();
            let headless = parse_bool(arg(rest, 1, "headless")?)?;
            let secret = arg(rest, 2, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(3));
            download_links(&url, headless, &secret, premium).await
        }
        "search" => {
            let query = arg(rest, 0, "query")?.to_string();
            let headless = parse_bool(arg(rest, 1, "headless")?)?;
            let secret = arg(rest, 2, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(3));
            site_search(&query, headless, &secret, premium).await
        }
        "search-local" => {
            let query = arg(rest, 0, "query")?.to_string();
            search_local(&query).await
        }
        "add-bookmark" | "remove-bookmark" => {
            let url = arg(rest, 0, "url")?.to_string();
            let headless = parse_bool(arg(rest, 1, "headless")?)?;
            let secret = arg(rest, 2, "master-secret")?.to_string();
            let premium = opt_bool(rest.get(3));
            bookmark(&url, command == "add-bookmark", headless, &secret, premium).await
        }
        "login" => {
            let username = arg(rest, 0, "username")?.to_string();
            let password = arg(rest, 1, "password")?.to_string();
            let headless = parse_bool(arg(rest, 2, "headless")?)?;
            let secret = arg(rest, 3, "master-secret")?.to_string();
            login(&username, &password, headless, &secret).await
        }
        "logout" => logout().await,
        other => bail!("unknown command {other:?}\n{}", usage()),
    }
}

enum CrawlKindArg {
    Saved,
    Board(String),
}

/// Walk a listing, sync every record and print the summary.
async fn crawl(
    kind: CrawlKindArg,
    headless: bool,
    secret: &str,
    premium: bool,
    max_pages: Option<u32>,
) -> Result<()> {
    let config = build_config(headless, premium)?;
    let catalog = Catalog::open(&config.db_path)
        .await
        .context("failed to open catalog")?;
    let vault = Vault::from_config(&config);

    let fetcher = Arc::new(ChromiumFetcher::launch(&config).await?);
    let result = async {
        auth::restore_session(fetcher.as_ref(), &vault, secret, &config).await?;
        let cookies = fetcher.cookies().await?;

        let (crawl_kind, pages) = match &kind {
            CrawlKindArg::Saved => (
                CrawlKind::SavedItems,
                max_pages.unwrap_or(config.saved_max_pages),
            ),
            CrawlKindArg::Board(url) => (
                CrawlKind::Board { url: url.clone() },
                max_pages.unwrap_or(config.board_max_pages),
            ),
        };
        let enrich = matches!(kind, CrawlKindArg::Saved);

        let worker = CrawlWorker::new(
            Arc::clone(&fetcher) as Arc<dyn gamedex::PageFetcher>,
            catalog.clone(),
            config.clone(),
            cookies,
        );
        let mut handle = worker.spawn(CrawlRequest {
            kind: crawl_kind,
            max_pages: pages,
            enrich_details: enrich,
        });

        while let Some(event) = handle.events.recv().await {
            match event {
                CrawlEvent::PageCrawled { page, items } => {
                    info!("page {page}: {items} items");
                }
                CrawlEvent::ItemSynced { id, title } => {
                    info!("synced #{id}: {title}");
                }
                CrawlEvent::ItemSkipped { title, reason } => {
                    info!("skipped {title:?}: {reason}");
                }
                CrawlEvent::Finished { synced, outcome } => {
                    info!("finished ({outcome:?}): {synced} items synced");
                }
            }
        }

        handle.task.await.context("crawl task panicked")?
    }
    .await;

    close_fetcher(fetcher).await;

    let report = result?;
    println!(
        "{}",
        serde_json::json!({ "count": report.items.len(), "data": report.items })
    );
    Ok(())
}

/// Full detail scrape for one thread, synced into the catalog.
async fn thread_details(url: &str, headless: bool, secret: &str, premium: bool) -> Result<()> {
    let config = build_config(headless, premium)?;
    let catalog = Catalog::open(&config.db_path)
        .await
        .context("failed to open catalog")?;
    let vault = Vault::from_config(&config);

    let fetcher = ChromiumFetcher::launch(&config).await?;
    let result = async {
        auth::restore_session(&fetcher, &vault, secret, &config).await?;
        let cookies = fetcher.cookies().await?;

        let mut record = runner::fetch_thread_details(&fetcher, &config, url).await?;

        let sync = Synchronizer::new(&catalog, &config).with_cookies(cookies);
        record.header_image = sync.cache_header(&record).await;
        if record.cover_image.is_none() {
            record.cover_image = record.header_image.clone();
        }
        sync.cache_cover(&mut record).await;
        sync.upsert(&record).await?;
        Ok::<_, anyhow::Error>(record)
    }
    .await;

    fetcher.close().await;
    let record = result?;
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}

/// Print the download links of one thread without touching the catalog.
async fn download_links(url: &str, headless: bool, secret: &str, premium: bool) -> Result<()> {
    let config = build_config(headless, premium)?;
    let vault = Vault::from_config(&config);

    let fetcher = ChromiumFetcher::launch(&config).await?;
    let result = async {
        auth::restore_session(&fetcher, &vault, secret, &config).await?;
        runner::fetch_download_links(&fetcher, &config, url).await
    }
    .await;

    fetcher.close().await;
    println!("{}", serde_json::to_string(&result?)?);
    Ok(())
}

/// Site search; results are printed, not synced.
async fn site_search(query: &str, headless: bool, secret: &str, premium: bool) -> Result<()> {
    let config = build_config(headless, premium)?;
    let vault = Vault::from_config(&config);

    let fetcher = ChromiumFetcher::launch(&config).await?;
    let result = async {
        auth::restore_session(&fetcher, &vault, secret, &config).await?;
        runner::site_search(&fetcher, &config, query).await
    }
    .await;

    fetcher.close().await;
    println!("{}", serde_json::to_string(&result?)?);
    Ok(())
}

/// Full-text search over the local catalog. No session required.
async fn search_local(query: &str) -> Result<()> {
    let config = AppConfig::load()?;
    let catalog = Catalog::open(&config.db_path)
        .await
        .context("failed to open catalog")?;
    let items = catalog.full_text_search(query).await?;
    println!("{}", serde_json::to_string(&items)?);
    Ok(())
}

async fn bookmark(url: &str, add: bool, headless: bool, secret: &str, premium: bool) -> Result<()> {
    let config = build_config(headless, premium)?;
    let catalog = Catalog::open(&config.db_path)
        .await
        .context("failed to open catalog")?;
    let vault = Vault::from_config(&config);

    let fetcher = ChromiumFetcher::launch(&config).await?;
    let result = async {
        auth::restore_session(&fetcher, &vault, secret, &config).await?;
        runner::set_bookmark(&fetcher, &catalog, &config, url, add).await
    }
    .await;

    fetcher.close().await;
    result?;
    println!("OK");
    Ok(())
}

/// Interactive-less login followed by an encrypted session save.
async fn login(username: &str, password: &str, headless: bool, secret: &str) -> Result<()> {
    let config = build_config(headless, false)?;
    let vault = Vault::from_config(&config);

    let fetcher = ChromiumFetcher::launch(&config).await?;
    let result = async {
        let logged_in_as = auth::login(&fetcher, username, password, &config).await?;
        let saved = auth::save_session(&fetcher, &vault, secret).await?;
        Ok::<_, anyhow::Error>((logged_in_as, saved))
    }
    .await;

    fetcher.close().await;
    let (logged_in_as, saved) = result?;
    println!(
        "{}",
        serde_json::json!({ "username": logged_in_as, "cookies_saved": saved })
    );
    Ok(())
}

async fn logout() -> Result<()> {
    let config = AppConfig::load()?;
    let vault = Vault::from_config(&config);
    auth::logout(None, &vault, &config).await?;
    println!("OK");
    Ok(())
}

fn build_config(headless: bool, premium: bool) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    config.headless = headless;
    config.premium_account = premium;
    Ok(config)
}

/// Drop our last reference and close the browser if nothing else holds
/// one.
async fn close_fetcher(fetcher: Arc<ChromiumFetcher>) {
    if let Ok(fetcher) = Arc::try_unwrap(fetcher) {
        fetcher.close().await;
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{name}>\n{}", usage()))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(anyhow!("expected true or false, got {other:?}")),
    }
}

fn opt_bool(value: Option<&String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
