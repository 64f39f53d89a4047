//! SQL migration definitions for the moralgraph relational store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: articles, moral_assessments",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested news articles. Created once, immutable thereafter.
CREATE TABLE IF NOT EXISTS articles (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT,
    title      TEXT NOT NULL,
    url        TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- One assessment per (article, foundation). No update path: creation only.
CREATE TABLE IF NOT EXISTS moral_assessments (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    moral_foundation TEXT NOT NULL,
    polarity         TEXT NOT NULL,
    intensity        REAL NOT NULL,
    confidence       REAL,
    hits             INTEGER,
    article_id       INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    UNIQUE(article_id, moral_foundation)
);

CREATE INDEX IF NOT EXISTS idx_assessments_article ON moral_assessments(article_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
