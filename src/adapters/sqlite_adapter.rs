//! SQLite row store: a local mirror of the dashboard tables.
//!
//! Pages are served with `LIMIT/OFFSET`. An optional `max_rows` cap makes the
//! store behave like a backend that silently truncates large pages.

use crate::adapters::sql::quote_ident;
use crate::domain::error::AnalyticsError;
use crate::domain::query::PageRequest;
use crate::domain::schema;
use crate::domain::table::Row;
use crate::domain::value::Value;
use crate::ports::config_port::ConfigPort;
use crate::ports::row_store::{PagePayload, RowStore};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::params_from_iter;
use tracing::debug;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    max_rows: Option<usize>,
}

fn pool_error(e: r2d2::Error) -> AnalyticsError {
    AnalyticsError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> AnalyticsError {
    AnalyticsError::Database {
        reason: e.to_string(),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(_) => SqlValue::Text(value.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Build the `SELECT` for one page plus its positional parameters.
fn page_sql(
    request: &PageRequest<'_>,
    limit: usize,
) -> Result<(String, Vec<SqlValue>), AnalyticsError> {
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
    let mut params = Vec::new();
    for (col, value) in request.eq_filters {
        clauses.push(format!("{} = ?", quote_ident(col)?));
        params.push(SqlValue::Text(value.clone()));
    }
    for (col, values) in request.in_filters {
        if values.is_empty() {
            clauses.push("1 = 0".to_string());
            continue;
        }
        let marks = vec!["?"; values.len()].join(", ");
        clauses.push(format!("{} IN ({marks})", quote_ident(col)?));
        params.extend(values.iter().map(|v| SqlValue::Text(v.clone())));
    }

    let mut sql = format!("SELECT {select} FROM {table}");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some(order) = request.order_by {
        let dir = if order.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY {} {dir}", quote_ident(&order.column)?));
    }
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(SqlValue::Integer(limit as i64));
    params.push(SqlValue::Integer(request.start as i64));
    Ok((sql, params))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| AnalyticsError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        let max_rows = config.get_int("sqlite", "max_rows", 0);

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self {
            pool,
            max_rows: (max_rows > 0).then_some(max_rows as usize),
        })
    }

    pub fn in_memory() -> Result<Self, AnalyticsError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self {
            pool,
            max_rows: None,
        })
    }

    /// Cap every page at `max_rows`, whatever the request asked for.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Create the four dashboard tables if they do not exist.
    pub fn initialize_schema(&self) -> Result<(), AnalyticsError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let housekeeping = "id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP";
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {stats} (
                {housekeeping},
                player_name TEXT NOT NULL,
                position TEXT,
                team TEXT,
                season TEXT,
                points REAL,
                value REAL,
                market_purchases_pct REAL,
                market_sales_pct REAL,
                as_of_date TEXT
            );
            CREATE TABLE IF NOT EXISTS {team} (
                {housekeeping},
                name TEXT NOT NULL,
                position TEXT,
                team TEXT
            );
            CREATE TABLE IF NOT EXISTS {value} (
                {housekeeping},
                player_name TEXT NOT NULL,
                date TEXT NOT NULL,
                market_value_eur REAL
            );
            CREATE INDEX IF NOT EXISTS idx_player_value_name_date ON {value}(player_name, date);
            CREATE TABLE IF NOT EXISTS {matches} (
                {housekeeping},
                player_name TEXT NOT NULL,
                match_date TEXT NOT NULL,
                team TEXT,
                opponent TEXT,
                points REAL,
                minutes REAL
            );",
            stats = schema::PLAYER_STATS.name,
            team = schema::CURRENT_TEAM.name,
            value = schema::PLAYER_VALUE.name,
            matches = schema::PLAYER_MATCHES.name,
        ))
        .map_err(query_error)?;

        Ok(())
    }

    /// Insert rows in one transaction. Each row writes only the columns it has.
    pub fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize, AnalyticsError> {
        let table = quote_ident(table)?;
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for row in rows {
            let columns = row
                .columns()
                .map(quote_ident)
                .collect::<Result<Vec<_>, _>>()?;
            let marks = vec!["?"; columns.len()].join(", ");
            let sql = format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(", "));
            let params: Vec<SqlValue> = row.iter().map(|(_, v)| to_sql(v)).collect();
            tx.execute(&sql, params_from_iter(params))
                .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(rows.len())
    }
}

impl RowStore for SqliteAdapter {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError> {
        let table = request.table_name;
        let limit = match self.max_rows {
            Some(cap) => request.requested_rows().min(cap),
            None => request.requested_rows(),
        };
        let (sql, params) = page_sql(request, limit)?;
        debug!(table, start = request.start, limit, "sqlite page");

        let conn = self
            .pool
            .get()
            .map_err(|e| AnalyticsError::transient(table, e))?;
        let mut stmt = conn.prepare(&sql).map_err(|e| {
            if e.to_string().contains("no such table") {
                AnalyticsError::TableNotFound {
                    table: table.to_string(),
                }
            } else {
                AnalyticsError::transient(table, e)
            }
        })?;
        let names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| AnalyticsError::transient(table, e))?;
        let mut out = Vec::new();
        while let Some(sql_row) = rows
            .next()
            .map_err(|e| AnalyticsError::transient(table, e))?
        {
            let mut row = Row::new();
            for (i, name) in names.iter().enumerate() {
                let cell = sql_row
                    .get_ref(i)
                    .map_err(|e| AnalyticsError::transient(table, e))?;
                row.set(name, from_sql(cell));
            }
            out.push(row);
        }
        Ok(PagePayload::Rows(out))
    }
}
