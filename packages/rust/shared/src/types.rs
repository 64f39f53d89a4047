//! Core domain types for the moral-foundation annotation pipeline.
//!
//! The canonical wide-row shape ([`CanonicalBatch`]) is the single internal
//! representation every downstream consumer sees: one row per article with a
//! nested per-foundation score map, plus a separate metadata row per article.

use serde::{Deserialize, Serialize};

/// Lower bound of the canonical intensity scale.
pub const INTENSITY_MIN: f64 = 0.0;
/// Upper bound of the canonical intensity scale.
pub const INTENSITY_MAX: f64 = 10.0;
/// Midpoint of the canonical scale: at or above is virtue, below is vice.
pub const INTENSITY_MIDPOINT: f64 = 5.0;

// ---------------------------------------------------------------------------
// Foundation
// ---------------------------------------------------------------------------

/// One of the five fixed moral foundations.
///
/// The declaration order is the fixed emission order used everywhere
/// downstream (persistence rows, graph projection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Foundation {
    Care,
    Fairness,
    Loyalty,
    Authority,
    Purity,
}

impl Foundation {
    /// All foundations in the fixed canonical order.
    pub const ALL: [Foundation; 5] = [
        Foundation::Care,
        Foundation::Fairness,
        Foundation::Loyalty,
        Foundation::Authority,
        Foundation::Purity,
    ];

    /// Lowercase label as stored relationally and used in graph vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Foundation::Care => "care",
            Foundation::Fairness => "fairness",
            Foundation::Loyalty => "loyalty",
            Foundation::Authority => "authority",
            Foundation::Purity => "purity",
        }
    }

    /// Match a free-form label against the fixed five, case-insensitively
    /// and trimmed. Unrecognized labels return `None` — never an error.
    pub fn parse(label: &str) -> Option<Foundation> {
        match label.trim().to_ascii_lowercase().as_str() {
            "care" => Some(Foundation::Care),
            "fairness" => Some(Foundation::Fairness),
            "loyalty" => Some(Foundation::Loyalty),
            "authority" => Some(Foundation::Authority),
            "purity" => Some(Foundation::Purity),
            _ => None,
        }
    }

    /// Position in the fixed order, used to index [`FoundationSet`].
    pub fn index(&self) -> usize {
        match self {
            Foundation::Care => 0,
            Foundation::Fairness => 1,
            Foundation::Loyalty => 2,
            Foundation::Authority => 3,
            Foundation::Purity => 4,
        }
    }
}

impl std::fmt::Display for Foundation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Polarity
// ---------------------------------------------------------------------------

/// Whether a foundation is expressed positively, negatively, or not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Virtue,
    Vice,
    None,
}

impl Polarity {
    /// Lowercase label as stored relationally and in the MFT vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Virtue => "virtue",
            Polarity::Vice => "vice",
            Polarity::None => "none",
        }
    }

    /// Parse a stored polarity label, trimmed and case-insensitive.
    pub fn parse(label: &str) -> Option<Polarity> {
        match label.trim().to_ascii_lowercase().as_str() {
            "virtue" => Some(Polarity::Virtue),
            "vice" => Some(Polarity::Vice),
            "none" => Some(Polarity::None),
            _ => None,
        }
    }

    /// Derive polarity from an intensity on the canonical 0–10 scale.
    /// At or above the midpoint is virtue, below is vice.
    pub fn from_intensity(intensity: f64) -> Polarity {
        if intensity >= INTENSITY_MIDPOINT {
            Polarity::Virtue
        } else {
            Polarity::Vice
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fetched / scored input shapes
// ---------------------------------------------------------------------------

/// An article as returned by the external fetcher boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedArticle {
    /// Article title (may be empty for degraded fetches).
    pub title: String,
    /// Source URL.
    pub url: String,
    /// Extracted body text handed to the scorer.
    pub text: String,
    /// Detected language, if the fetcher knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One foundation's score as returned by the external scoring boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFoundation {
    pub foundation: Foundation,
    pub polarity: Polarity,
    /// Magnitude on the canonical 0–10 scale.
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Count of lexicon matches backing the score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<i64>,
}

/// Input to the relational persister: one article plus its scores.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Stable external identifier; `"article:<id>"` is derived when absent.
    pub identifier: Option<String>,
    pub title: String,
    pub url: String,
    pub scores: Vec<ScoredFoundation>,
}

// ---------------------------------------------------------------------------
// Persisted entity shapes
// ---------------------------------------------------------------------------

/// An article row as persisted relationally, with its assigned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub title: String,
    pub url: String,
}

/// A moral assessment row as persisted relationally.
///
/// `moral_foundation` and `polarity` stay raw strings here: records may come
/// from older data whose labels the normalizer matches leniently. Assessments
/// reference their article by id only — no back-pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: i64,
    pub moral_foundation: String,
    pub polarity: String,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<i64>,
    pub article_id: i64,
}

// ---------------------------------------------------------------------------
// Canonical wide rows
// ---------------------------------------------------------------------------

/// One foundation's normalized score inside a canonical wide row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationScore {
    pub polarity: Polarity,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<i64>,
}

/// Per-article map from each of the five foundations to an optional score,
/// iterated in the fixed foundation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoundationSet {
    scores: [Option<FoundationScore>; 5],
}

impl FoundationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, foundation: Foundation) -> Option<&FoundationScore> {
        self.scores[foundation.index()].as_ref()
    }

    pub fn set(&mut self, foundation: Foundation, score: FoundationScore) {
        self.scores[foundation.index()] = Some(score);
    }

    /// True when all five foundations are absent.
    pub fn is_empty(&self) -> bool {
        self.scores.iter().all(Option::is_none)
    }

    /// Iterate all five foundations in fixed order, present or not.
    pub fn iter(&self) -> impl Iterator<Item = (Foundation, Option<&FoundationScore>)> {
        Foundation::ALL
            .into_iter()
            .map(|f| (f, self.scores[f.index()].as_ref()))
    }
}

/// Canonical article metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub article_id: i64,
    /// Graph subject identifier, always populated (falls back to
    /// `"article:<id>"` during normalization).
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Canonical per-article assessment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRow {
    pub article_id: i64,
    pub foundations: FoundationSet,
}

/// The canonical wide-row set: the one shape both the relational persister's
/// output adapter and the RDF projector consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBatch {
    /// Article metadata rows, in input order.
    pub articles: Vec<ArticleRow>,
    /// Assessment rows, in input order.
    pub assessments: Vec<AssessmentRow>,
}

impl CanonicalBatch {
    /// Look up the metadata row for an article id.
    pub fn article(&self, article_id: i64) -> Option<&ArticleRow> {
        self.articles.iter().find(|a| a.article_id == article_id)
    }
}
