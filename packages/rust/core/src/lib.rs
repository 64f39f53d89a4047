//! Core pipeline orchestration for moralgraph.
//!
//! This crate ties fetching, scoring, relational persistence, and graph
//! projection into end-to-end workflows, and holds the tall-to-wide
//! normalization between the two stores.

pub mod http;
pub mod normalize;
pub mod pipeline;

pub use http::{HttpFetcher, HttpScorer};
pub use normalize::DropPolicy;
pub use pipeline::{
    AnnotateResult, ArticleFetcher, HealthReport, MoralScorer, Pipeline, PipelineReport,
    RequestMode, SkippedUrl, backfill, health,
};
