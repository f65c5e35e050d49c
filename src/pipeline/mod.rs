//! The pipeline orchestrator.
//!
//! `Pipeline` ties the stages together: source adapters feed items, the
//! ledger decides what is new, accepted items become local artifacts
//! with their media, and each run ends with a ranking recompute and a
//! promotion pass over the bucket.

mod run;

pub use run::{AbandonedPromotion, Pipeline, RunSummary};
