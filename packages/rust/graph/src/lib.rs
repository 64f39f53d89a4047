//! Triple-store side of the moralgraph pipeline.
//!
//! [`FusekiClient`] speaks SPARQL update/query over HTTP to one dataset and
//! can run a background liveness probe. [`Projector`] turns canonical batches
//! into `INSERT DATA` statements: idempotent article metadata, freshly minted
//! annotation nodes.

pub mod client;
pub mod projector;
pub mod triples;

pub use client::{DEFAULT_HEARTBEAT_INTERVAL, FusekiClient};
pub use projector::{ProjectionReport, Projector, annotation_triples, article_triples};
pub use triples::{Term, Triple, insert_data};
