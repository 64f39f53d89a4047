//! Normalization of persisted rows into the canonical wide-row shape.
//!
//! Relational rows are tall: one assessment row per (article, foundation).
//! The projector wants wide rows: one row per article with a fixed
//! five-foundation map. [`from_records`] pivots tall to wide; [`normalize`]
//! applies the row-drop policy. Both are pure and side-effect free, so the
//! same records always normalize to the same batch.

use moralgraph_shared::{
    ArticleRecord, ArticleRow, AssessmentRecord, AssessmentRow, CanonicalBatch, Foundation,
    FoundationScore, FoundationSet, Polarity,
};
use tracing::debug;

/// What to do with an assessment row whose five foundations are all absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Drop all-empty assessment rows (article metadata rows always survive).
    #[default]
    DropEmpty,
    /// Keep all-empty assessment rows.
    KeepEmpty,
}

impl DropPolicy {
    /// Map the `[pipeline] drop_empty_rows` config flag.
    pub fn from_flag(drop_empty_rows: bool) -> Self {
        if drop_empty_rows {
            DropPolicy::DropEmpty
        } else {
            DropPolicy::KeepEmpty
        }
    }
}

/// Derived graph identifier for an article without a stored one.
pub fn derived_identifier(article_id: i64) -> String {
    format!("article:{article_id}")
}

/// Pivot persisted records into canonical wide rows.
///
/// Every input article gets a wide row, all-absent when it has no recognized
/// assessments, so the drop policy decides its fate rather than this pivot.
/// Unrecognized foundation labels are skipped, not errors: older rows may
/// carry labels outside the fixed five. When two rows name the same
/// (article, foundation), the later row wins. Empty or whitespace titles and
/// urls become absent fields.
pub fn from_records(
    articles: &[ArticleRecord],
    assessments: &[AssessmentRecord],
) -> CanonicalBatch {
    let article_rows: Vec<ArticleRow> = articles
        .iter()
        .map(|a| ArticleRow {
            article_id: a.id,
            identifier: a
                .identifier
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| derived_identifier(a.id)),
            title: non_empty(&a.title),
            url: non_empty(&a.url),
        })
        .collect();

    // One wide row per article up front, in input order; assessments for
    // article ids outside the input list still get their own row appended.
    let mut assessment_rows: Vec<AssessmentRow> = articles
        .iter()
        .map(|a| AssessmentRow {
            article_id: a.id,
            foundations: FoundationSet::new(),
        })
        .collect();
    for record in assessments {
        let Some(foundation) = Foundation::parse(&record.moral_foundation) else {
            debug!(
                article_id = record.article_id,
                label = %record.moral_foundation,
                "skipping assessment with unrecognized foundation label"
            );
            continue;
        };

        let polarity = Polarity::parse(&record.polarity)
            .unwrap_or_else(|| Polarity::from_intensity(record.intensity));

        let idx = match assessment_rows
            .iter()
            .position(|r| r.article_id == record.article_id)
        {
            Some(idx) => idx,
            None => {
                assessment_rows.push(AssessmentRow {
                    article_id: record.article_id,
                    foundations: FoundationSet::new(),
                });
                assessment_rows.len() - 1
            }
        };

        assessment_rows[idx].foundations.set(
            foundation,
            FoundationScore {
                polarity,
                intensity: record.intensity,
                confidence: record.confidence,
                hits: record.hits,
            },
        );
    }

    CanonicalBatch {
        articles: article_rows,
        assessments: assessment_rows,
    }
}

/// Apply the drop policy. Idempotent: normalizing an already-normalized
/// batch returns it unchanged.
pub fn normalize(mut batch: CanonicalBatch, policy: DropPolicy) -> CanonicalBatch {
    if policy == DropPolicy::DropEmpty {
        batch.assessments.retain(|row| !row.foundations.is_empty());
    }
    batch
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
