//! Catalog storage
//!
//! Sqlite-backed store for catalog items with an FTS5 shadow table for
//! search. Lookups resolve by thread id first, URL second. Writes happen
//! inside caller-owned transactions handed out by `begin()`, so one
//! upsert is one transaction and the FTS triggers keep the index change
//! inside it. The pool is limited to a single connection, which
//! serializes writers without any extra locking.

mod schema;

pub use schema::SCHEMA_VERSION;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::extract::ItemRecord;

/// One cataloged thread as stored.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CatalogItem {
    pub id: i64,
    pub thread_id: Option<String>,
    pub url: Option<String>,
    pub title: String,
    pub version: Option<String>,
    pub engine: Option<String>,
    pub status: Option<String>,
    pub developer: Option<String>,
    pub description: Option<String>,
    pub changelog: Option<String>,
    pub cover_image: Option<String>,
    pub header_image: Option<String>,
    pub category: Option<String>,
    pub forum_id: Option<String>,
    pub last_update: Option<String>,
    pub is_bookmarked: bool,
    pub added_at: Option<String>,
    pub last_synced: Option<String>,
    pub tags: Vec<String>,
}

/// Sqlite catalog handle.
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open (creating if needed) the catalog at the given path and apply
    /// the schema.
    pub async fn open(path: &Path) -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        Self::connect(options).await
    }

    /// In-memory catalog, used by tests.
    pub async fn open_in_memory() -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> sqlx::Result<Self> {
        // One connection: storage access is serial, and a single writer
        // cannot interleave transactions.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(schema::SCHEMA_SQL).execute(&pool).await?;
        sqlx::raw_sql(schema::FTS_TRIGGERS_SQL).execute(&pool).await?;
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('schema_version', ?)")
            .bind(SCHEMA_VERSION.to_string())
            .execute(&pool)
            .await?;

        info!("catalog schema initialized (version {SCHEMA_VERSION})");
        Ok(Self { pool })
    }

    /// Start the transactional unit of work for one upsert.
    pub async fn begin(&self) -> sqlx::Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await
    }

    #[instrument(skip(self))]
    pub async fn find_by_thread_id(&self, thread_id: &str) -> sqlx::Result<Option<CatalogItem>> {
        let row = sqlx::query("SELECT * FROM items WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_url(&self, url: &str) -> sqlx::Result<Option<CatalogItem>> {
        let row = sqlx::query("SELECT * FROM items WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    pub async fn get(&self, id: i64) -> sqlx::Result<Option<CatalogItem>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    pub async fn all_items(&self) -> sqlx::Result<Vec<CatalogItem>> {
        let rows = sqlx::query("SELECT * FROM items ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    /// Ranked full-text search over the shadow table.
    #[instrument(skip(self))]
    pub async fn full_text_search(&self, query: &str) -> sqlx::Result<Vec<CatalogItem>> {
        let rows = sqlx::query(
            "SELECT g.* FROM items g
             JOIN items_fts ON g.id = items_fts.rowid
             WHERE items_fts MATCH ?
             ORDER BY rank",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        debug!(hits = rows.len(), "full text search complete");
        rows.iter().map(item_from_row).collect()
    }

    /// Resolve an existing row id inside the caller's transaction:
    /// thread id first, URL second. Running the lookup in the same
    /// transaction as the write keeps the resolve-then-write pair atomic
    /// even if another upsert races in from a second process.
    pub async fn resolve_id(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        thread_id: Option<&str>,
        url: Option<&str>,
    ) -> sqlx::Result<Option<i64>> {
        if let Some(thread_id) = thread_id.filter(|t| !t.is_empty()) {
            let row = sqlx::query("SELECT id FROM items WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&mut **tx)
                .await?;
            return row.map(|r| r.try_get("id")).transpose();
        }
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            let row = sqlx::query("SELECT id FROM items WHERE url = ?")
                .bind(url)
                .fetch_optional(&mut **tx)
                .await?;
            return row.map(|r| r.try_get("id")).transpose();
        }
        Ok(None)
    }

    /// Insert a new item inside the caller's transaction. Only fields
    /// present on the record are written; the FTS insert trigger indexes
    /// the row before the transaction commits.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        record: &ItemRecord,
        now: &str,
    ) -> sqlx::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO items (title, url, thread_id, version, status, engine, developer,
                                description, changelog, cover_image, header_image, category,
                                forum_id, last_update, is_bookmarked, last_synced)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.title.as_deref().unwrap_or_default())
        .bind(non_empty(&record.url))
        .bind(non_empty(&record.thread_id))
        .bind(non_empty(&record.version))
        .bind(record.status.as_deref().unwrap_or("Unknown"))
        .bind(record.engine.as_deref().unwrap_or("Unknown"))
        .bind(non_empty(&record.developer))
        .bind(non_empty(&record.description))
        .bind(non_empty(&record.changelog))
        .bind(non_empty(&record.cover_image))
        .bind(non_empty(&record.header_image))
        .bind(non_empty(&record.category))
        .bind(non_empty(&record.forum_id))
        .bind(non_empty(&record.last_update))
        .bind(record.is_bookmarked.unwrap_or(false))
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Merge the present, non-empty fields of `record` over the stored
    /// row. Absent fields stay untouched; `last_synced` always refreshes.
    pub async fn update(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        id: i64,
        record: &ItemRecord,
        now: &str,
    ) -> sqlx::Result<()> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE items SET ");
        let mut fields = qb.separated(", ");

        let text_fields: [(&str, &Option<String>); 13] = [
            ("title", &record.title),
            ("url", &record.url),
            ("thread_id", &record.thread_id),
            ("version", &record.version),
            ("status", &record.status),
            ("engine", &record.engine),
            ("developer", &record.developer),
            ("description", &record.description),
            ("changelog", &record.changelog),
            ("cover_image", &record.cover_image),
            ("header_image", &record.header_image),
            ("category", &record.category),
            ("forum_id", &record.forum_id),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value
                && !value.is_empty()
            {
                fields.push(format!("{column} = "));
                fields.push_bind_unseparated(value.clone());
            }
        }
        if record.last_update.as_deref().is_some_and(|v| !v.is_empty()) {
            fields.push("last_update = ");
            fields.push_bind_unseparated(record.last_update.clone());
        }
        if let Some(bookmarked) = record.is_bookmarked {
            fields.push("is_bookmarked = ");
            fields.push_bind_unseparated(bookmarked);
        }
        fields.push("last_synced = ");
        fields.push_bind_unseparated(now.to_string());

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Replace the item's tag relations. Runs after the row exists, in
    /// the same transaction, to satisfy foreign key ordering.
    pub async fn replace_tags(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        id: i64,
        tags: &[String],
    ) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&mut **tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO item_tags (item_id, tag_id)
                 SELECT ?, id FROM tags WHERE name = ?",
            )
            .bind(id)
            .bind(tag)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Set the bookmark flag on an existing item, resolved by thread id
    /// or URL. Returns whether a row changed.
    pub async fn set_bookmarked(
        &self,
        thread_id: Option<&str>,
        url: &str,
        bookmarked: bool,
    ) -> sqlx::Result<bool> {
        let result = match thread_id {
            Some(thread_id) => {
                sqlx::query("UPDATE items SET is_bookmarked = ? WHERE thread_id = ?")
                    .bind(bookmarked)
                    .bind(thread_id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("UPDATE items SET is_bookmarked = ? WHERE url = ?")
                    .bind(bookmarked)
                    .bind(url)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    /// Delete an item; the FTS delete trigger removes the index entry in
    /// the same statement's transaction.
    pub async fn delete(&self, id: i64) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn tags_for(&self, id: i64) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT t.name FROM tags t
             JOIN item_tags it ON t.id = it.tag_id
             WHERE it.item_id = ?
             ORDER BY t.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| row.try_get("name")).collect()
    }

    pub async fn item_count(&self) -> sqlx::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM items")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("count")
    }

    async fn hydrate(&self, row: Option<SqliteRow>) -> sqlx::Result<Option<CatalogItem>> {
        let Some(row) = row else { return Ok(None) };
        let mut item = item_from_row(&row)?;
        item.tags = self.tags_for(item.id).await?;
        Ok(Some(item))
    }
}

fn item_from_row(row: &SqliteRow) -> sqlx::Result<CatalogItem> {
    Ok(CatalogItem {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        version: row.try_get("version")?,
        engine: row.try_get("engine")?,
        status: row.try_get("status")?,
        developer: row.try_get("developer")?,
        description: row.try_get("description")?,
        changelog: row.try_get("changelog")?,
        cover_image: row.try_get("cover_image")?,
        header_image: row.try_get("header_image")?,
        category: row.try_get("category")?,
        forum_id: row.try_get("forum_id")?,
        last_update: row.try_get("last_update")?,
        is_bookmarked: row.try_get("is_bookmarked")?,
        added_at: row.try_get("added_at")?,
        last_synced: row.try_get("last_synced")?,
        tags: Vec::new(),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
