#![allow(dead_code)]

use biwenger_analytics::domain::error::AnalyticsError;
use biwenger_analytics::domain::query::PageRequest;
pub use biwenger_analytics::domain::table::Row;
use biwenger_analytics::ports::row_store::{PagePayload, RowStore};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory row store with an optional silent page cap and injected faults.
pub struct MockRowStore {
    pub tables: HashMap<String, Vec<Row>>,
    pub cap: Option<usize>,
    pub fail_on_call: Option<usize>,
    pub malformed_on_call: Option<usize>,
    pub calls: RefCell<Vec<(String, usize, usize)>>,
    /// `(table, order column, ascending)` of every page request.
    pub orders: RefCell<Vec<(String, Option<(String, bool)>)>>,
    call_count: Cell<usize>,
}

impl MockRowStore {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            cap: None,
            fail_on_call: None,
            malformed_on_call: None,
            calls: RefCell::new(Vec::new()),
            orders: RefCell::new(Vec::new()),
            call_count: Cell::new(0),
        }
    }

    pub fn with_table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Fail the n-th page request (1-based) with a transport error.
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Answer the n-th page request (1-based) with a non-array body.
    pub fn malformed_on_call(mut self, n: usize) -> Self {
        self.malformed_on_call = Some(n);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.get()
    }
}

impl RowStore for MockRowStore {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError> {
        let n = self.call_count.get() + 1;
        self.call_count.set(n);
        self.calls.borrow_mut().push((
            request.table_name.to_string(),
            request.start,
            request.end,
        ));
        self.orders.borrow_mut().push((
            request.table_name.to_string(),
            request
                .order_by
                .map(|o| (o.column.clone(), o.ascending)),
        ));

        if self.fail_on_call == Some(n) {
            return Err(AnalyticsError::transient(
                request.table_name,
                "connection reset by peer",
            ));
        }
        if self.malformed_on_call == Some(n) {
            return Ok(PagePayload::Malformed(
                "{\"message\":\"upstream timeout\"}".to_string(),
            ));
        }
        let Some(all) = self.tables.get(request.table_name) else {
            return Err(AnalyticsError::TableNotFound {
                table: request.table_name.to_string(),
            });
        };

        let mut rows: Vec<&Row> = all
            .iter()
            .filter(|r| {
                request
                    .eq_filters
                    .iter()
                    .all(|(c, v)| r.get(c).key_string().as_deref() == Some(v.as_str()))
            })
            .filter(|r| {
                request
                    .in_filters
                    .iter()
                    .all(|(c, set)| r.get(c).key_string().is_some_and(|k| set.contains(&k)))
            })
            .collect();
        if let Some(order) = request.order_by {
            rows.sort_by_key(|r| r.get(&order.column).key_string());
            if !order.ascending {
                rows.reverse();
            }
        }

        let mut take = request.requested_rows();
        if let Some(cap) = self.cap {
            take = take.min(cap);
        }
        Ok(PagePayload::Rows(
            rows.into_iter()
                .skip(request.start)
                .take(take)
                .cloned()
                .collect(),
        ))
    }
}

pub fn numbered_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| Row::new().with("id", i as i64).with("n", i as i64))
        .collect()
}

pub fn value_row(player: &str, date: &str, value: f64) -> Row {
    Row::new()
        .with("player_name", player)
        .with("date", date)
        .with("market_value_eur", value)
}

pub fn stats_row(player: &str, position: &str, team: &str, points: i64, value: f64) -> Row {
    Row::new()
        .with("player_name", player)
        .with("position", position)
        .with("team", team)
        .with("season", "2024-2025")
        .with("points", points)
        .with("value", value)
        .with("market_purchases_pct", 12.0)
        .with("market_sales_pct", 4.0)
}

pub fn match_row(player: &str, date: &str, points: i64) -> Row {
    Row::new()
        .with("player_name", player)
        .with("match_date", date)
        .with("points", points)
}

/// A store holding all four dashboard tables.
pub fn league_store() -> MockRowStore {
    MockRowStore::new()
        .with_table(
            "biwenger_player_value",
            vec![
                value_row("Pedri", "2024-10-03", 62_000_000.0),
                value_row("Lewandowski", "2024-10-01", 20_000_000.0),
                value_row("Pedri", "2024-10-01", 60_000_000.0),
                value_row("Pedri", "2024-10-02", 61_000_000.0),
                value_row("Lewandowski", "2024-10-02", 19_000_000.0),
            ],
        )
        .with_table(
            "biwenger_player_stats",
            vec![
                stats_row("Pedri", "Midfielder", "Barcelona", 120, 62_000_000.0),
                stats_row("Lewandowski", "Forward", "Barcelona", 150, 19_000_000.0),
                stats_row("Oblak", "Goalkeeper", "Atlético", 90, 0.0),
            ],
        )
        .with_table(
            "biwenger_current_team",
            vec![Row::new().with("name", "Pedri")],
        )
        .with_table(
            "biwenger_player_matches",
            vec![match_row("Pedri", "2024-10-02", 9)],
        )
}
