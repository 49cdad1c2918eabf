//! Integration tests for Gleaner
//!
//! HTTP sources and the ingest endpoint are served by wiremock; databases and
//! asset directories live in temporary directories.

mod common;
mod frontier_tests;
mod ingest_tests;
mod ledger_tests;
mod orchestrator_tests;
mod scraper_tests;
