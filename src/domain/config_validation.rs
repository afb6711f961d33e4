//! Configuration validation.
//!
//! Checks every section the CLI reads before any backend is contacted.

use crate::domain::error::AnalyticsError;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;
use std::str::FromStr;

/// Which row store serves the fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgrest,
    Sqlite,
    Postgres,
    Csv,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" => Ok(BackendKind::Postgrest),
            "sqlite" => Ok(BackendKind::Sqlite),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "csv" => Ok(BackendKind::Csv),
            other => Err(format!(
                "unknown backend '{other}', expected postgrest, sqlite, postgres or csv"
            )),
        }
    }
}

pub const LOG_FORMATS: [&str; 3] = ["compact", "pretty", "json"];

pub fn validate_analytics_config(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    let kind = backend_kind(config)?;
    validate_backend(config, kind)?;
    validate_page_size(config)?;
    validate_enrich(config)?;
    validate_logging(config)?;
    Ok(())
}

/// `[backend] kind`, defaulting to PostgREST.
pub fn backend_kind(config: &dyn ConfigPort) -> Result<BackendKind, AnalyticsError> {
    match config.get_string("backend", "kind") {
        None => Ok(BackendKind::Postgrest),
        Some(raw) => raw.parse().map_err(|reason| AnalyticsError::ConfigInvalid {
            section: "backend".to_string(),
            key: "kind".to_string(),
            reason,
        }),
    }
}

/// Parse a comma-separated list of positive, distinct periods.
pub fn parse_periods(section: &str, key: &str, input: &str) -> Result<Vec<usize>, AnalyticsError> {
    let invalid = |reason: String| AnalyticsError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    };

    let mut periods = Vec::new();
    let mut seen = HashSet::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty entry in list".to_string()));
        }
        let period: usize = trimmed
            .parse()
            .map_err(|_| invalid(format!("'{trimmed}' is not a whole number")))?;
        if period == 0 {
            return Err(invalid("periods must be at least 1".to_string()));
        }
        if !seen.insert(period) {
            return Err(invalid(format!("duplicate period {period}")));
        }
        periods.push(period);
    }
    Ok(periods)
}

fn require_non_empty(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), AnalyticsError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(AnalyticsError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn require_positive_or_absent(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), AnalyticsError> {
    if config.get_string(section, key).is_none() {
        return Ok(());
    }
    if config.get_int(section, key, 0) < 1 {
        return Err(AnalyticsError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least 1"),
        });
    }
    Ok(())
}

fn validate_backend(config: &dyn ConfigPort, kind: BackendKind) -> Result<(), AnalyticsError> {
    match kind {
        BackendKind::Postgrest => {
            require_non_empty(config, "postgrest", "url")?;
            require_positive_or_absent(config, "postgrest", "timeout_secs")
        }
        BackendKind::Sqlite => {
            require_non_empty(config, "sqlite", "path")?;
            require_positive_or_absent(config, "sqlite", "pool_size")?;
            require_positive_or_absent(config, "sqlite", "max_rows")
        }
        BackendKind::Postgres => require_non_empty(config, "postgres", "connection_string"),
        BackendKind::Csv => {
            require_non_empty(config, "csv", "dir")?;
            require_positive_or_absent(config, "csv", "max_rows")
        }
    }
}

fn validate_page_size(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    require_positive_or_absent(config, "fetch", "page_size")
}

fn validate_enrich(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    for key in ["lag_periods", "rolling_windows"] {
        if let Some(raw) = config.get_string("enrich", key) {
            parse_periods("enrich", key, &raw)?;
        }
    }
    Ok(())
}

fn validate_logging(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    match config.get_string("logging", "format") {
        Some(f) if !LOG_FORMATS.contains(&f.trim()) => Err(AnalyticsError::ConfigInvalid {
            section: "logging".to_string(),
            key: "format".to_string(),
            reason: format!("expected one of {}", LOG_FORMATS.join(", ")),
        }),
        _ => Ok(()),
    }
}
