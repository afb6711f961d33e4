//! Helpers shared by the SQL row stores.

use crate::domain::error::AnalyticsError;

/// Quote a table or column name, rejecting anything but `[A-Za-z0-9_]`.
pub fn quote_ident(name: &str) -> Result<String, AnalyticsError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(AnalyticsError::InvalidRequest {
            reason: format!("invalid identifier '{name}'"),
        });
    }
    Ok(format!("\"{name}\""))
}
