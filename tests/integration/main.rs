//! Integration tests for the enrichment pipeline.

mod mock_services;
mod pipeline;
