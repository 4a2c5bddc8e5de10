//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the canonical per-game observation (`CanonicalRecord`, `MetricKind`)
//! - the raw, schema-free table read from source files (`RawTable`, `RawCell`)
//! - run configuration (`CollectConfig`, `NormalizeConfig`) and skip outcomes

pub mod types;

pub use types::*;
