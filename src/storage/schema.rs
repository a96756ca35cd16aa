//! Catalog schema.
//!
//! The full-text index is an FTS5 shadow table over `items`, kept in step
//! by triggers. Because the triggers fire inside whatever transaction
//! mutates the row, the index can never lag the table; there is no
//! separate reconciliation pass.

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT UNIQUE,
    thread_id TEXT UNIQUE,
    version TEXT,
    status TEXT DEFAULT 'Unknown',
    engine TEXT DEFAULT 'Unknown',
    developer TEXT,
    description TEXT,
    changelog TEXT,
    cover_image TEXT,
    header_image TEXT,
    category TEXT,
    forum_id TEXT,
    last_update TEXT,
    is_bookmarked INTEGER DEFAULT 0,

    added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    last_synced TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS item_tags (
    item_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (item_id, tag_id),
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
    title,
    description,
    developer,
    tags,
    engine,
    changelog,
    content='items',
    content_rowid='id'
);

CREATE INDEX IF NOT EXISTS idx_items_thread_id ON items(thread_id);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
CREATE INDEX IF NOT EXISTS idx_items_engine ON items(engine);
CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
CREATE INDEX IF NOT EXISTS idx_items_bookmarked ON items(is_bookmarked);
"#;

pub const FTS_TRIGGERS_SQL: &str = r#"
DROP TRIGGER IF EXISTS items_ai;
DROP TRIGGER IF EXISTS items_ad;
DROP TRIGGER IF EXISTS items_au;

CREATE TRIGGER items_ai AFTER INSERT ON items BEGIN
    INSERT INTO items_fts(rowid, title, description, developer, tags, engine, changelog)
    VALUES (new.id, new.title, new.description, new.developer, '', new.engine, new.changelog);
END;

CREATE TRIGGER items_ad AFTER DELETE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, description, developer, tags, engine, changelog)
    VALUES ('delete', old.id, old.title, old.description, old.developer, '', old.engine, old.changelog);
END;

CREATE TRIGGER items_au AFTER UPDATE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, description, developer, tags, engine, changelog)
    VALUES ('delete', old.id, old.title, old.description, old.developer, '', old.engine, old.changelog);
    INSERT INTO items_fts(rowid, title, description, developer, tags, engine, changelog)
    VALUES (new.id, new.title, new.description, new.developer, '', new.engine, new.changelog);
END;
"#;
