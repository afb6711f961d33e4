//! Concrete adapter implementations for ports.

#[cfg(feature = "postgrest")]
pub mod postgrest_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_chart_adapter;
