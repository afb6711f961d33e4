//! Row store access port.

use crate::domain::error::AnalyticsError;
use crate::domain::query::PageRequest;
use crate::domain::table::Row;

/// What one page request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PagePayload {
    Rows(Vec<Row>),
    /// The backend answered, but not with an array of row objects.
    Malformed(String),
}

/// A remote (or local) table store read one row range at a time.
///
/// Implementations may return fewer rows than requested when the backend caps
/// page sizes. Transport failures map to `TransientFetch`, unknown tables to
/// `TableNotFound`.
pub trait RowStore {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError>;
}
