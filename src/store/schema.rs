/// Schema of every asset shard.
pub const SHARD_SCHEMA: &str = r#"
-- Large objects: content lives in fixed-size pages, addressed by oid
CREATE TABLE IF NOT EXISTS large_objects (
    oid INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS large_object_pages (
    oid INTEGER NOT NULL REFERENCES large_objects(oid) ON DELETE CASCADE,
    pageno INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (oid, pageno)
);

-- Asset metadata; the blob is owned exclusively by its row
CREATE TABLE IF NOT EXISTS assets (
    name TEXT NOT NULL,
    owner_uuid TEXT NOT NULL,
    blob_oid INTEGER NOT NULL REFERENCES large_objects(oid),
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(owner_uuid, name)
);
"#;

/// Schema of the single unsharded store holding users and their tokens.
pub const UNSHARDED_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    uuid TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,   -- argon2id PHC string with embedded salt
    created_at TEXT DEFAULT (datetime('now'))
);

-- At most one row per user; renewal rewrites it in place
CREATE TABLE IF NOT EXISTS access_tokens (
    token_value TEXT NOT NULL UNIQUE,
    owner_uuid TEXT NOT NULL UNIQUE REFERENCES users(uuid) ON DELETE CASCADE,
    ip_addr TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;
