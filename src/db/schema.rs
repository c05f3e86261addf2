//! Database schema and migrations.
//!
//! Migrations are applied in order. The schema_version table tracks which
//! ones have already run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    telegram_id INTEGER NOT NULL UNIQUE,
    username    TEXT,
    first_name  TEXT,
    last_name   TEXT,
    photo_url   TEXT,
    used_space  INTEGER NOT NULL DEFAULT 0 CHECK (used_space >= 0),  -- bytes
    quota       INTEGER NOT NULL CHECK (quota >= 0),                 -- bytes
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    last_login  TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1
);
"#,
    // v2: folders and files
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    parent_id   INTEGER REFERENCES folders(id),
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    is_deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_folders_owner_parent ON folders(owner_id, parent_id);

CREATE TABLE files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id   INTEGER REFERENCES folders(id),
    filename    TEXT NOT NULL,
    stored_name TEXT NOT NULL UNIQUE,   -- UUID name in blob storage
    size        INTEGER NOT NULL,       -- bytes
    mime_type   TEXT NOT NULL,
    is_public   INTEGER NOT NULL DEFAULT 0,
    downloads   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    is_deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_files_owner_folder ON files(owner_id, folder_id);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
    // v3: share links
    r#"
ALTER TABLE files ADD COLUMN share_token TEXT;

CREATE UNIQUE INDEX idx_files_share_token ON files(share_token) WHERE share_token IS NOT NULL;
"#,
    // v4: bot login codes
    r#"
CREATE TABLE auth_codes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    code        TEXT NOT NULL UNIQUE,
    telegram_id INTEGER,
    user_id     INTEGER REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at  TEXT NOT NULL,
    used_at     TEXT
);

CREATE INDEX idx_auth_codes_expires_at ON auth_codes(expires_at);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
        assert!(MIGRATIONS.iter().all(|m| !m.trim().is_empty()));
    }

    #[test]
    fn test_first_migration_creates_users() {
        assert!(MIGRATIONS[0].contains("CREATE TABLE users"));
        assert!(MIGRATIONS[0].contains("telegram_id INTEGER NOT NULL UNIQUE"));
    }
}
