//! Shared types, error model, and configuration for moralgraph.
//!
//! This crate is the foundation depended on by all other moralgraph crates.
//! It provides:
//! - [`MoralGraphError`] — the unified error type
//! - Domain types ([`Foundation`], [`Polarity`], [`CanonicalBatch`] and the
//!   fetched/persisted entity shapes)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, GraphStoreConfig, PipelineConfig, ScoringConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MoralGraphError, Result};
pub use types::{
    ArticleRecord, ArticleRow, AssessmentRecord, AssessmentRow, CanonicalBatch, FetchedArticle,
    Foundation, FoundationScore, FoundationSet, INTENSITY_MAX, INTENSITY_MIDPOINT, INTENSITY_MIN,
    NewArticle, Polarity, ScoredFoundation,
};
