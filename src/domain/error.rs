//! Domain error types.

/// Top-level error type for biwenger-analytics.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("fetch from table {table} failed: {reason}")]
    TransientFetch { table: String, reason: String },

    #[error("table {table} not found")]
    TableNotFound { table: String },

    #[error("missing required column: {column}")]
    Schema { column: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub fn schema(column: impl Into<String>) -> Self {
        AnalyticsError::Schema {
            column: column.into(),
        }
    }

    pub fn transient(table: impl Into<String>, reason: impl ToString) -> Self {
        AnalyticsError::TransientFetch {
            table: table.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&AnalyticsError> for std::process::ExitCode {
    fn from(err: &AnalyticsError) -> Self {
        let code: u8 = match err {
            AnalyticsError::Io(_) | AnalyticsError::Json(_) | AnalyticsError::Csv(_) => 1,
            AnalyticsError::ConfigParse { .. }
            | AnalyticsError::ConfigMissing { .. }
            | AnalyticsError::ConfigInvalid { .. } => 2,
            AnalyticsError::TransientFetch { .. }
            | AnalyticsError::TableNotFound { .. }
            | AnalyticsError::Database { .. } => 3,
            AnalyticsError::Schema { .. } | AnalyticsError::InvalidRequest { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
