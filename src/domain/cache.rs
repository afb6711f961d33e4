//! Memoized table fetches.
//!
//! Results are keyed by the full [`FetchRequest`]. Entries are never evicted
//! for the lifetime of the cache; only an explicit [`CachedFetcher::clear`]
//! drops them. Failed fetches are not stored. Tables are handed out behind
//! `Rc` so every caller sees the same immutable value.

use crate::domain::error::AnalyticsError;
use crate::domain::fetcher::RowFetcher;
use crate::domain::query::FetchRequest;
use crate::domain::table::Table;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

pub struct CachedFetcher<'a> {
    fetcher: RowFetcher<'a>,
    entries: RefCell<HashMap<FetchRequest, Rc<Table>>>,
}

impl<'a> CachedFetcher<'a> {
    pub fn new(fetcher: RowFetcher<'a>) -> Self {
        Self {
            fetcher,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn fetch(&self, request: &FetchRequest) -> Result<Rc<Table>, AnalyticsError> {
        if let Some(hit) = self.entries.borrow().get(request) {
            debug!(table = %request.table_name, "cache hit");
            return Ok(Rc::clone(hit));
        }

        let table = Rc::new(self.fetcher.fetch(request)?);
        self.entries
            .borrow_mut()
            .insert(request.clone(), Rc::clone(&table));
        Ok(table)
    }

    pub fn contains(&self, request: &FetchRequest) -> bool {
        self.entries.borrow().contains_key(request)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
