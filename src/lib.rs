//! Opening enricher: chess opening catalogue enrichment.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod catalogue;
pub mod remote;
pub mod analysis;
pub mod pipeline;
