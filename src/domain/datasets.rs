//! The dashboard's datasets: fetch, validate and derive in one call each.

use crate::domain::cache::CachedFetcher;
use crate::domain::enrich::{enrich, EnrichConfig};
use crate::domain::error::AnalyticsError;
use crate::domain::join::left_join;
use crate::domain::query::{FetchRequest, DEFAULT_PAGE_SIZE, HOUSEKEEPING_COLUMNS};
use crate::domain::schema::{self, TableSchema};
use crate::domain::snapshot::{derive_ratios, label_positions, RatioColumns};
use crate::domain::table::Table;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub player_stats: String,
    pub current_team: String,
    pub player_value: String,
    pub player_matches: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            player_stats: schema::PLAYER_STATS.name.into(),
            current_team: schema::CURRENT_TEAM.name.into(),
            player_value: schema::PLAYER_VALUE.name.into(),
            player_matches: schema::PLAYER_MATCHES.name.into(),
        }
    }
}

/// Column every dataset read is ordered by. It must be unique per row so that
/// offset pages stay stable between requests.
pub const DEFAULT_PAGE_ORDER_COLUMN: &str = "id";

/// Which players a loader reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlayerFilter {
    #[default]
    All,
    /// Exactly these players. An empty list matches nobody.
    Only(Vec<String>),
}

impl PlayerFilter {
    /// `All` for an empty list, otherwise `Only`.
    pub fn from_names(names: &[String]) -> Self {
        if names.is_empty() {
            PlayerFilter::All
        } else {
            PlayerFilter::Only(names.to_vec())
        }
    }

    fn apply(&self, request: FetchRequest, column: &str) -> FetchRequest {
        match self {
            PlayerFilter::All => request,
            PlayerFilter::Only(names) => request.is_in(column, names),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSettings {
    pub tables: TableNames,
    pub page_size: usize,
    pub page_order_column: String,
    pub drop_columns: Vec<String>,
    pub enrich: EnrichConfig,
    pub ratios: RatioColumns,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            page_size: DEFAULT_PAGE_SIZE,
            page_order_column: DEFAULT_PAGE_ORDER_COLUMN.into(),
            drop_columns: HOUSEKEEPING_COLUMNS.iter().map(|c| c.to_string()).collect(),
            enrich: EnrichConfig::default(),
            ratios: RatioColumns::default(),
        }
    }
}

pub struct Datasets<'a> {
    fetcher: &'a CachedFetcher<'a>,
    settings: DatasetSettings,
}

impl<'a> Datasets<'a> {
    pub fn new(fetcher: &'a CachedFetcher<'a>, settings: DatasetSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &DatasetSettings {
        &self.settings
    }

    fn request(&self, table: &str) -> FetchRequest {
        FetchRequest::new(table)
            .page_size(self.settings.page_size)
            .order_by(&self.settings.page_order_column, true)
            .drop_columns(&self.settings.drop_columns)
    }

    fn fetch(
        &self,
        request: &FetchRequest,
        schema: &TableSchema,
    ) -> Result<Rc<Table>, AnalyticsError> {
        let table = self.fetcher.fetch(request)?;
        schema.validate(&table)?;
        Ok(table)
    }

    /// Latest stats snapshot with ratios and position labels.
    pub fn player_stats(&self) -> Result<Table, AnalyticsError> {
        let req = self.request(&self.settings.tables.player_stats);
        let raw = self.fetch(&req, &schema::PLAYER_STATS)?;
        let with_ratios = derive_ratios(&raw, &self.settings.ratios)?;
        Ok(label_positions(&with_ratios, "position"))
    }

    pub fn current_team(&self) -> Result<Rc<Table>, AnalyticsError> {
        let req = self.request(&self.settings.tables.current_team);
        self.fetch(&req, &schema::CURRENT_TEAM)
    }

    /// Sorted names of the players in the current squad.
    pub fn current_team_names(&self) -> Result<Vec<String>, AnalyticsError> {
        Ok(self.current_team()?.unique_values("name"))
    }

    /// Enriched market value history for the selected players.
    pub fn market_value(&self, players: &PlayerFilter) -> Result<Table, AnalyticsError> {
        let req = players.apply(
            self.request(&self.settings.tables.player_value),
            &self.settings.enrich.entity_column,
        );
        let raw = self.fetch(&req, &schema::PLAYER_VALUE)?;
        enrich(&raw, &self.settings.enrich)
    }

    pub fn player_matches(&self, players: &PlayerFilter) -> Result<Rc<Table>, AnalyticsError> {
        let req = players.apply(
            self.request(&self.settings.tables.player_matches),
            "player_name",
        );
        self.fetch(&req, &schema::PLAYER_MATCHES)
    }

    /// Market value history with match results and, where the stats table is
    /// dated, the stats snapshot of the same day.
    pub fn market_with_context(&self, players: &PlayerFilter) -> Result<Table, AnalyticsError> {
        let date = self.settings.enrich.date_column.as_str();
        let entity = self.settings.enrich.entity_column.as_str();

        let market = self.market_value(players)?;
        let matches = self.player_matches(players)?;
        let joined = left_join(
            &market,
            &matches,
            &[(entity, "player_name"), (date, "match_date")],
        )?;

        let stats = self.player_stats()?;
        if !stats.has_column("as_of_date") {
            return Ok(joined);
        }
        left_join(&joined, &stats, &[(entity, "player_name"), (date, "as_of_date")])
    }
}
