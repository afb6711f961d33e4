//! Core domain types and logic: fetching, enrichment, derived metrics, charts.

pub mod error;
pub mod value;
pub mod table;
pub mod query;
pub mod fetcher;
pub mod cache;
pub mod enrich;
pub mod snapshot;
pub mod schema;
pub mod join;
pub mod chart;
pub mod datasets;
pub mod config_validation;
