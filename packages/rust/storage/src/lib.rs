//! libSQL storage layer — the relational half of the pipeline.
//!
//! The [`Storage`] struct wraps a libSQL database holding article and
//! moral-assessment rows. One `Storage` handle is constructed per
//! request/batch and passed through the call chain; there is no global
//! connection state.
//!
//! [`Storage::persist_batch`] is the single write path: it creates all
//! Article and Assessment rows for a batch inside exactly one transaction.
//! On any failure the transaction is rolled back and nothing from the batch
//! is visible afterward.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use moralgraph_shared::{
    ArticleRecord, AssessmentRecord, INTENSITY_MAX, INTENSITY_MIN, MoralGraphError, NewArticle,
    Result,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// Output of a successful batch persist: the fully populated records,
/// with assigned ids, for downstream projection.
#[derive(Debug, Clone)]
pub struct PersistedBatch {
    pub articles: Vec<ArticleRecord>,
    pub assessments: Vec<AssessmentRecord>,
}

impl Storage {
    /// Open or create a database at `path` and run pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MoralGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    MoralGraphError::Persistence(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Batch persistence
    // -----------------------------------------------------------------------

    /// Persist a batch of articles and their assessments as one atomic unit.
    ///
    /// All rows are created inside a single transaction; any failure during
    /// construction or commit rolls the whole batch back and propagates.
    /// Inputs are validated before the transaction is opened, so a rejected
    /// batch has no side effects at all.
    pub async fn persist_batch(&self, batch: &[NewArticle]) -> Result<PersistedBatch> {
        validate_batch(batch)?;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| MoralGraphError::Persistence(format!("begin failed: {e}")))?;

        match insert_batch(&tx, batch).await {
            Ok(persisted) => {
                tx.commit()
                    .await
                    .map_err(|e| MoralGraphError::Persistence(format!("commit failed: {e}")))?;
                tracing::info!(
                    articles = persisted.articles.len(),
                    assessments = persisted.assessments.len(),
                    "batch persisted"
                );
                Ok(persisted)
            }
            Err(e) => {
                // Best-effort rollback; the original error is what matters.
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback failed after batch error");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Query surface (backfill + lookup)
    // -----------------------------------------------------------------------

    /// Get an article by id.
    pub async fn get_article(&self, article_id: i64) -> Result<Option<ArticleRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, identifier, title, url FROM articles WHERE id = ?1",
                params![article_id],
            )
            .await
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(MoralGraphError::Persistence(e.to_string())),
        }
    }

    /// List all articles, in insertion order.
    pub async fn list_articles(&self) -> Result<Vec<ArticleRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, identifier, title, url FROM articles ORDER BY id",
                params![],
            )
            .await
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    /// List all assessments, in insertion order.
    pub async fn list_assessments(&self) -> Result<Vec<AssessmentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, moral_foundation, polarity, intensity, confidence, hits, article_id
                 FROM moral_assessments ORDER BY id",
                params![],
            )
            .await
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_assessment(&row)?);
        }
        Ok(results)
    }

    /// List assessments belonging to one article.
    pub async fn assessments_for_article(
        &self,
        article_id: i64,
    ) -> Result<Vec<AssessmentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, moral_foundation, polarity, intensity, confidence, hits, article_id
                 FROM moral_assessments WHERE article_id = ?1 ORDER BY id",
                params![article_id],
            )
            .await
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_assessment(&row)?);
        }
        Ok(results)
    }
}

/// Reject a batch before any side effect when a row is malformed.
fn validate_batch(batch: &[NewArticle]) -> Result<()> {
    for article in batch {
        if article.url.trim().is_empty() {
            return Err(MoralGraphError::validation(format!(
                "article '{}' has an empty url",
                article.title
            )));
        }
        for score in &article.scores {
            if !score.intensity.is_finite()
                || score.intensity < INTENSITY_MIN
                || score.intensity > INTENSITY_MAX
            {
                return Err(MoralGraphError::validation(format!(
                    "intensity {} for {} out of the {INTENSITY_MIN}–{INTENSITY_MAX} scale",
                    score.intensity, score.foundation
                )));
            }
        }
    }
    Ok(())
}

/// Insert every row of the batch on the given transaction.
async fn insert_batch(
    tx: &libsql::Transaction,
    batch: &[NewArticle],
) -> Result<PersistedBatch> {
    let now = Utc::now().to_rfc3339();
    let mut articles = Vec::with_capacity(batch.len());
    let mut assessments = Vec::new();

    for new_article in batch {
        tx.execute(
            "INSERT INTO articles (identifier, title, url, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                new_article.identifier.as_deref(),
                new_article.title.as_str(),
                new_article.url.as_str(),
                now.as_str(),
            ],
        )
        .await
        .map_err(|e| MoralGraphError::Persistence(format!("article insert failed: {e}")))?;

        let article_id = tx.last_insert_rowid();

        for score in &new_article.scores {
            tx.execute(
                "INSERT INTO moral_assessments
                   (moral_foundation, polarity, intensity, confidence, hits, article_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    score.foundation.as_str(),
                    score.polarity.as_str(),
                    score.intensity,
                    score.confidence,
                    score.hits,
                    article_id,
                ],
            )
            .await
            .map_err(|e| {
                MoralGraphError::Persistence(format!(
                    "assessment insert failed for article {article_id}: {e}"
                ))
            })?;

            assessments.push(AssessmentRecord {
                id: tx.last_insert_rowid(),
                moral_foundation: score.foundation.as_str().to_string(),
                polarity: score.polarity.as_str().to_string(),
                intensity: score.intensity,
                confidence: score.confidence,
                hits: score.hits,
                article_id,
            });
        }

        articles.push(ArticleRecord {
            id: article_id,
            identifier: new_article.identifier.clone(),
            title: new_article.title.clone(),
            url: new_article.url.clone(),
        });
    }

    Ok(PersistedBatch {
        articles,
        assessments,
    })
}

/// Convert a database row to an [`ArticleRecord`].
fn row_to_article(row: &libsql::Row) -> Result<ArticleRecord> {
    Ok(ArticleRecord {
        id: row
            .get::<i64>(0)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        identifier: row.get::<String>(1).ok(),
        title: row
            .get::<String>(2)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        url: row
            .get::<String>(3)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
    })
}

/// Convert a database row to an [`AssessmentRecord`].
fn row_to_assessment(row: &libsql::Row) -> Result<AssessmentRecord> {
    Ok(AssessmentRecord {
        id: row
            .get::<i64>(0)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        moral_foundation: row
            .get::<String>(1)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        polarity: row
            .get::<String>(2)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        intensity: row
            .get::<f64>(3)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
        confidence: row.get::<f64>(4).ok(),
        hits: row.get::<i64>(5).ok(),
        article_id: row
            .get::<i64>(6)
            .map_err(|e| MoralGraphError::Persistence(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moralgraph_shared::{Foundation, Polarity, ScoredFoundation};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("mg_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn care_score() -> ScoredFoundation {
        ScoredFoundation {
            foundation: Foundation::Care,
            polarity: Polarity::Virtue,
            intensity: 7.0,
            confidence: Some(0.9),
            hits: Some(3),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("mg_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.schema_version().await, 1);
    }

    #[tokio::test]
    async fn persist_batch_assigns_ids() {
        let storage = test_storage().await;

        let batch = vec![
            NewArticle {
                identifier: Some("news#42".into()),
                title: "First".into(),
                url: "https://news.example.com/first".into(),
                scores: vec![care_score()],
            },
            NewArticle {
                identifier: None,
                title: "Second".into(),
                url: "https://news.example.com/second".into(),
                scores: vec![],
            },
        ];

        let persisted = storage.persist_batch(&batch).await.expect("persist");
        assert_eq!(persisted.articles.len(), 2);
        assert_eq!(persisted.assessments.len(), 1);
        assert!(persisted.articles[0].id > 0);
        assert_eq!(
            persisted.assessments[0].article_id,
            persisted.articles[0].id
        );
        assert_eq!(persisted.assessments[0].moral_foundation, "care");

        let listed = storage.list_articles().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].identifier.as_deref(), Some("news#42"));
        assert_eq!(listed[1].identifier, None);
    }

    #[tokio::test]
    async fn batch_failure_rolls_back_everything() {
        let storage = test_storage().await;

        // Second article violates UNIQUE(article_id, moral_foundation).
        let batch = vec![
            NewArticle {
                identifier: None,
                title: "Fine".into(),
                url: "https://news.example.com/ok".into(),
                scores: vec![care_score()],
            },
            NewArticle {
                identifier: None,
                title: "Broken".into(),
                url: "https://news.example.com/dup".into(),
                scores: vec![care_score(), care_score()],
            },
        ];

        let result = storage.persist_batch(&batch).await;
        assert!(matches!(result, Err(MoralGraphError::Persistence(_))));

        // Nothing from the batch is visible afterward — not even the first article.
        assert!(storage.list_articles().await.unwrap().is_empty());
        assert!(storage.list_assessments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_intensity_rejected_before_side_effects() {
        let storage = test_storage().await;

        let mut bad = care_score();
        bad.intensity = 11.5;
        let batch = vec![NewArticle {
            identifier: None,
            title: "Out of scale".into(),
            url: "https://news.example.com/bad".into(),
            scores: vec![bad],
        }];

        let result = storage.persist_batch(&batch).await;
        assert!(matches!(result, Err(MoralGraphError::Validation { .. })));
        assert!(storage.list_articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_url_rejected() {
        let storage = test_storage().await;
        let batch = vec![NewArticle {
            identifier: None,
            title: "No url".into(),
            url: "  ".into(),
            scores: vec![],
        }];
        let result = storage.persist_batch(&batch).await;
        assert!(matches!(result, Err(MoralGraphError::Validation { .. })));
    }

    #[tokio::test]
    async fn query_surface_roundtrip() {
        let storage = test_storage().await;

        let batch = vec![NewArticle {
            identifier: Some("news#1".into()),
            title: "Article".into(),
            url: "https://news.example.com/a".into(),
            scores: vec![
                care_score(),
                ScoredFoundation {
                    foundation: Foundation::Purity,
                    polarity: Polarity::Vice,
                    intensity: 2.5,
                    confidence: None,
                    hits: None,
                },
            ],
        }];

        let persisted = storage.persist_batch(&batch).await.expect("persist");
        let article_id = persisted.articles[0].id;

        let found = storage.get_article(article_id).await.expect("get");
        assert_eq!(found.unwrap().title, "Article");
        assert!(storage.get_article(article_id + 100).await.unwrap().is_none());

        let assessments = storage
            .assessments_for_article(article_id)
            .await
            .expect("assessments");
        assert_eq!(assessments.len(), 2);
        assert_eq!(assessments[0].moral_foundation, "care");
        assert_eq!(assessments[1].moral_foundation, "purity");
        assert_eq!(assessments[1].confidence, None);
        assert_eq!(assessments[1].hits, None);
    }
}
