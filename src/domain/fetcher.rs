//! Exhaustive paginated table reads.
//!
//! The fetcher asks for successive row ranges and advances `start` by the
//! rows actually returned, so pages never overlap. An empty page ends the
//! read. A short page ends it too, except that the first short page is taken
//! as a possible silent backend cap: the page size drops to the observed
//! length and one more range is requested. A store that really capped the
//! page then keeps returning full pages of that size; one that had run out
//! returns an empty or short page and the read stops.

use crate::domain::error::AnalyticsError;
use crate::domain::query::FetchRequest;
use crate::domain::table::Table;
use crate::ports::row_store::{PagePayload, RowStore};
use tracing::{debug, info, warn};

pub struct RowFetcher<'a> {
    store: &'a dyn RowStore,
}

impl<'a> RowFetcher<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self { store }
    }

    pub fn fetch(&self, request: &FetchRequest) -> Result<Table, AnalyticsError> {
        request.validate()?;

        let mut rows = Vec::new();
        let mut start = 0usize;
        let mut pages = 0usize;
        let mut page_size = request.page_size;
        let mut cap_probed = false;

        loop {
            let page = request.page_range(start, page_size);
            let requested = page.requested_rows();
            let payload = self.store.fetch_page(&page)?;
            pages += 1;

            let page_rows = match payload {
                PagePayload::Rows(page_rows) => page_rows,
                PagePayload::Malformed(reason) => {
                    warn!(
                        table = %request.table_name,
                        start,
                        %reason,
                        "malformed page treated as empty"
                    );
                    Vec::new()
                }
            };

            let returned = page_rows.len();
            debug!(
                table = %request.table_name,
                start,
                end = page.end,
                returned,
                "fetched page"
            );
            rows.extend(page_rows);

            if returned == 0 {
                break;
            }
            if returned < requested {
                if cap_probed {
                    break;
                }
                debug!(
                    table = %request.table_name,
                    requested,
                    returned,
                    "short page, probing for backend cap"
                );
                cap_probed = true;
                page_size = returned;
            }
            start += returned;
        }

        info!(
            table = %request.table_name,
            rows = rows.len(),
            pages,
            "fetched table"
        );

        Ok(Table::from_rows(rows).drop_columns(&request.drop_columns))
    }
}
