//! PostgreSQL row store reading the dashboard tables directly.
//!
//! Each row is selected as `to_json(t)` (column order kept, unlike `jsonb`)
//! and decoded the same way as a PostgREST response, so both backends yield
//! identical cell types.

use crate::adapters::sql::quote_ident;
use crate::domain::error::AnalyticsError;
use crate::domain::query::PageRequest;
use crate::domain::table::Row;
use crate::domain::value::Value;
use crate::ports::config_port::ConfigPort;
use crate::ports::row_store::{PagePayload, RowStore};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use std::cell::RefCell;
use tracing::debug;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

/// A page query with its parameters, numbered `$1..`.
#[derive(Debug)]
pub struct PageQuery {
    pub sql: String,
    pub text_params: Vec<String>,
    pub list_params: Vec<Vec<String>>,
    pub limit: i64,
    pub offset: i64,
}

/// Build the `SELECT` for one page. Filters compare the column's text form.
pub fn page_query(request: &PageRequest<'_>) -> Result<PageQuery, AnalyticsError> {
    let table = quote_ident(request.table_name)?;
    let select = if request.select_columns.is_empty() {
        "*".to_string()
    } else {
        request
            .select_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")
    };

    let mut clauses = Vec::new();
    let mut text_params = Vec::new();
    let mut list_params = Vec::new();
    let mut n = 0;
    for (col, value) in request.eq_filters {
        n += 1;
        clauses.push(format!("{}::text = ${n}", quote_ident(col)?));
        text_params.push(value.clone());
    }
    for (col, values) in request.in_filters {
        n += 1;
        clauses.push(format!("{}::text = ANY(${n})", quote_ident(col)?));
        list_params.push(values.iter().cloned().collect());
    }

    let mut inner = format!("SELECT {select} FROM {table}");
    if !clauses.is_empty() {
        inner.push_str(" WHERE ");
        inner.push_str(&clauses.join(" AND "));
    }
    if let Some(order) = request.order_by {
        let dir = if order.ascending { "ASC" } else { "DESC" };
        inner.push_str(&format!(" ORDER BY {} {dir}", quote_ident(&order.column)?));
    }
    inner.push_str(&format!(" LIMIT ${} OFFSET ${}", n + 1, n + 2));

    Ok(PageQuery {
        sql: format!("SELECT to_json(t) FROM ({inner}) t"),
        text_params,
        list_params,
        limit: request.requested_rows() as i64,
        offset: request.start as i64,
    })
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| AnalyticsError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| AnalyticsError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }
}

impl RowStore for PostgresAdapter {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError> {
        let table = request.table_name;
        let query = page_query(request)?;
        debug!(table, start = request.start, end = request.end, "postgres page");

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        for p in &query.text_params {
            params.push(p);
        }
        for p in &query.list_params {
            params.push(p);
        }
        params.push(&query.limit);
        params.push(&query.offset);

        let rows = self
            .client
            .borrow_mut()
            .query(query.sql.as_str(), &params)
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNDEFINED_TABLE) {
                    AnalyticsError::TableNotFound {
                        table: table.to_string(),
                    }
                } else {
                    AnalyticsError::transient(table, e)
                }
            })?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let json: serde_json::Value = row
                .try_get(0)
                .map_err(|e| AnalyticsError::transient(table, e))?;
            let fields = match json {
                serde_json::Value::Object(fields) => fields,
                other => return Ok(PagePayload::Malformed(other.to_string())),
            };
            out.push(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Row>(),
            );
        }
        Ok(PagePayload::Rows(out))
    }
}
