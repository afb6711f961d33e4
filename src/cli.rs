//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::{write_table, write_table_to_path, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_chart_adapter::JsonChartAdapter;
use crate::domain::cache::CachedFetcher;
use crate::domain::chart::{build_line, build_scatter, LineOptions, ScatterOptions};
use crate::domain::config_validation::{
    backend_kind, parse_periods, validate_analytics_config, BackendKind,
};
use crate::domain::datasets::{DatasetSettings, Datasets, PlayerFilter, TableNames};
use crate::domain::error::AnalyticsError;
use crate::domain::fetcher::RowFetcher;
use crate::domain::query::FetchRequest;
use crate::domain::table::Table;
use crate::logging::{self, LogSettings};
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::row_store::RowStore;

#[derive(Parser, Debug)]
#[command(
    name = "biwenger-analytics",
    about = "Market value and stats analytics for a Biwenger fantasy football league"
)]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a whole table and print it as CSV
    Fetch {
        table: String,
        /// Comma-separated columns to select
        #[arg(long)]
        select: Option<String>,
        /// Equality filter, `column=value` (repeatable)
        #[arg(long = "eq", value_parser = parse_key_value)]
        eq_filters: Vec<(String, String)>,
        /// Membership filter, `column=a,b,c` (repeatable)
        #[arg(long = "in", value_parser = parse_key_value)]
        in_filters: Vec<(String, String)>,
        /// Ordering, `column` or `column.desc`
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
        /// Keep the `id` and `created_at` columns
        #[arg(long)]
        keep_housekeeping: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Enriched market value history
    Market {
        /// Restrict to these players (repeatable)
        #[arg(short, long = "player")]
        players: Vec<String>,
        /// Restrict to the players in the current squad
        #[arg(long)]
        current_team: bool,
        /// Join match results and same-day stats onto each row
        #[arg(long)]
        with_context: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Latest stats snapshot with derived ratios
    Stats {
        #[command(flatten)]
        filters: StatsFilters,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scatter chart of two stats metrics, as JSON
    Scatter {
        #[arg(short, long)]
        x: String,
        #[arg(short, long)]
        y: String,
        #[command(flatten)]
        filters: StatsFilters,
        /// Extra players to highlight (repeatable)
        #[arg(long = "highlight")]
        highlight: Vec<String>,
        /// Do not mark the current squad
        #[arg(long)]
        no_current_team: bool,
        #[arg(long)]
        no_tertiles: bool,
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Per-player time series chart, as JSON
    Timeseries {
        #[arg(long, default_value = "market_value_eur")]
        value: String,
        #[arg(short, long = "player")]
        players: Vec<String>,
        #[arg(long)]
        days_back: Option<i64>,
        #[arg(short, long, default_value = "-")]
        output: String,
    },
}

/// Filters on the stats snapshot, applied after positions are labelled.
#[derive(Args, Debug, Clone, Default)]
pub struct StatsFilters {
    /// Season, e.g. `2024-2025`
    #[arg(long)]
    pub season: Option<String>,
    #[arg(long)]
    pub team: Option<String>,
    /// Labelled position, e.g. `3 - Centrocampista`
    #[arg(long)]
    pub position: Option<String>,
}

impl StatsFilters {
    fn apply(&self, stats: &Table) -> Table {
        let stats = filter_eq(stats, "season", self.season.as_deref());
        let stats = filter_eq(&stats, "team", self.team.as_deref());
        filter_eq(&stats, "position", self.position.as_deref())
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected column=value, got '{raw}'")),
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    logging::init(&LogSettings::from_config(&config));

    match execute(&config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let Some(path) = path else {
        return Ok(FileConfigAdapter::empty());
    };
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Validate the configuration, open the configured store and run one command.
pub fn execute(config: &dyn ConfigPort, command: Command) -> Result<(), AnalyticsError> {
    validate_analytics_config(config)?;
    let settings = build_settings(config)?;
    let store = open_store(config)?;
    run_command(store.as_ref(), settings, command)
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<DatasetSettings, AnalyticsError> {
    let mut settings = DatasetSettings::default();
    let table = |key: &str, default: String| config.get_string("tables", key).unwrap_or(default);
    let defaults = TableNames::default();
    settings.tables = TableNames {
        player_stats: table("player_stats", defaults.player_stats),
        current_team: table("current_team", defaults.current_team),
        player_value: table("player_value", defaults.player_value),
        player_matches: table("player_matches", defaults.player_matches),
    };

    let page_size = config.get_int("fetch", "page_size", settings.page_size as i64);
    if page_size < 1 {
        return Err(AnalyticsError::ConfigInvalid {
            section: "fetch".into(),
            key: "page_size".into(),
            reason: "page_size must be at least 1".into(),
        });
    }
    settings.page_size = page_size as usize;

    if let Some(col) = config.get_string("fetch", "order_column") {
        settings.page_order_column = col.trim().to_string();
    }

    if let Some(cols) = config.get_list("fetch", "drop_columns") {
        settings.drop_columns = cols;
    }
    if let Some(raw) = config.get_string("enrich", "lag_periods") {
        settings.enrich.lag_periods = parse_periods("enrich", "lag_periods", &raw)?;
    }
    if let Some(raw) = config.get_string("enrich", "rolling_windows") {
        settings.enrich.rolling_windows = parse_periods("enrich", "rolling_windows", &raw)?;
    }
    Ok(settings)
}

fn feature_disabled(feature: &str) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        section: "backend".into(),
        key: "kind".into(),
        reason: format!("built without the `{feature}` feature"),
    }
}

#[cfg(feature = "postgrest")]
fn open_postgrest(config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    use crate::adapters::postgrest_adapter::PostgrestAdapter;
    Ok(Box::new(PostgrestAdapter::from_config(config)?))
}

#[cfg(not(feature = "postgrest"))]
fn open_postgrest(_config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    Err(feature_disabled("postgrest"))
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Box::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    Err(feature_disabled("sqlite"))
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;
    Ok(Box::new(PostgresAdapter::from_config(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    Err(feature_disabled("postgres"))
}

/// The row store selected by `[backend] kind`.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn RowStore>, AnalyticsError> {
    let kind = backend_kind(config)?;
    info!(?kind, "opening row store");
    match kind {
        BackendKind::Postgrest => open_postgrest(config),
        BackendKind::Sqlite => open_sqlite(config),
        BackendKind::Postgres => open_postgres(config),
        BackendKind::Csv => Ok(Box::new(CsvAdapter::from_config(config)?)),
    }
}

/// Run one command against an already opened store.
pub fn run_command(
    store: &dyn RowStore,
    settings: DatasetSettings,
    command: Command,
) -> Result<(), AnalyticsError> {
    match command {
        Command::Fetch {
            table,
            select,
            eq_filters,
            in_filters,
            order,
            page_size,
            keep_housekeeping,
            output,
        } => {
            let mut request = FetchRequest::new(&table)
                .page_size(page_size.unwrap_or(settings.page_size))
                .drop_columns(&settings.drop_columns);
            if keep_housekeeping {
                request = request.drop_columns::<&str>(&[]);
            }
            if let Some(cols) = select {
                let cols: Vec<&str> = cols.split(',').map(str::trim).collect();
                request = request.select(&cols);
            }
            for (col, value) in &eq_filters {
                request = request.eq(col, value);
            }
            for (col, values) in &in_filters {
                let values: Vec<&str> = values.split(',').map(str::trim).collect();
                request = request.is_in(col, &values);
            }
            if let Some(order) = order {
                let (col, ascending) = match order.rsplit_once('.') {
                    Some((col, "desc")) => (col.to_string(), false),
                    Some((col, "asc")) => (col.to_string(), true),
                    _ => (order, true),
                };
                request = request.order_by(&col, ascending);
            }
            let table = RowFetcher::new(store).fetch(&request)?;
            emit_table(&table, output.as_deref())
        }
        Command::Market {
            players,
            current_team,
            with_context,
            output,
        } => {
            let cache = CachedFetcher::new(RowFetcher::new(store));
            let datasets = Datasets::new(&cache, settings);
            let filter = if current_team {
                let mut players = players;
                players.extend(datasets.current_team_names()?);
                PlayerFilter::Only(players)
            } else {
                PlayerFilter::from_names(&players)
            };
            let table = if with_context {
                datasets.market_with_context(&filter)?
            } else {
                datasets.market_value(&filter)?
            };
            emit_table(&table, output.as_deref())
        }
        Command::Stats { filters, output } => {
            let cache = CachedFetcher::new(RowFetcher::new(store));
            let stats = Datasets::new(&cache, settings).player_stats()?;
            emit_table(&filters.apply(&stats), output.as_deref())
        }
        Command::Scatter {
            x,
            y,
            filters,
            highlight,
            no_current_team,
            no_tertiles,
            output,
        } => {
            let cache = CachedFetcher::new(RowFetcher::new(store));
            let datasets = Datasets::new(&cache, settings);
            let stats = filters.apply(&datasets.player_stats()?);
            let mut opts = ScatterOptions::new(&x, &y);
            opts.extra_highlight = highlight;
            opts.show_tertiles = !no_tertiles;
            if !no_current_team {
                opts.current_team = datasets.current_team_names()?;
            }
            let chart = build_scatter(&stats, &opts)?;
            JsonChartAdapter::new().write(&chart, &output)
        }
        Command::Timeseries {
            value,
            players,
            days_back,
            output,
        } => {
            let cache = CachedFetcher::new(RowFetcher::new(store));
            let market =
                Datasets::new(&cache, settings).market_value(&PlayerFilter::from_names(&players))?;
            let mut opts = LineOptions::new(&value);
            opts.players = players;
            opts.days_back = days_back;
            let chart = build_line(&market, &opts)?;
            JsonChartAdapter::new().write(&chart, &output)
        }
    }
}

fn filter_eq(table: &Table, column: &str, wanted: Option<&str>) -> Table {
    match wanted {
        Some(w) => table.filter(|row| row.get(column).key_string().as_deref() == Some(w)),
        None => table.clone(),
    }
}

fn emit_table(table: &Table, output: Option<&Path>) -> Result<(), AnalyticsError> {
    match output {
        Some(path) => {
            write_table_to_path(table, path)?;
            eprintln!("Wrote {} rows to {}", table.len(), path.display());
            Ok(())
        }
        None => write_table(table, std::io::stdout().lock()),
    }
}
