//! Port traits implemented by adapters.

pub mod chart_port;
pub mod config_port;
pub mod row_store;
