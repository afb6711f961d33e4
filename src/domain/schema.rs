//! Known tables and the columns each one must carry.

use crate::domain::error::AnalyticsError;
use crate::domain::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub required: &'static [&'static str],
}

/// Latest-snapshot stats, one row per player and season.
pub const PLAYER_STATS: TableSchema = TableSchema {
    name: "biwenger_player_stats",
    required: &[
        "player_name",
        "position",
        "team",
        "season",
        "points",
        "value",
        "market_purchases_pct",
        "market_sales_pct",
    ],
};

/// Players on the user's current squad.
pub const CURRENT_TEAM: TableSchema = TableSchema {
    name: "biwenger_current_team",
    required: &["name"],
};

/// Daily market value history, keyed by player and date.
pub const PLAYER_VALUE: TableSchema = TableSchema {
    name: "biwenger_player_value",
    required: &["player_name", "date", "market_value_eur"],
};

/// Per-match results, keyed by player and match date.
pub const PLAYER_MATCHES: TableSchema = TableSchema {
    name: "biwenger_player_matches",
    required: &["player_name", "match_date"],
};

pub const ALL: [TableSchema; 4] = [PLAYER_STATS, CURRENT_TEAM, PLAYER_VALUE, PLAYER_MATCHES];

impl TableSchema {
    /// Check a fetched table. Empty tables carry no schema and always pass.
    pub fn validate(&self, table: &Table) -> Result<(), AnalyticsError> {
        if table.is_empty() {
            return Ok(());
        }
        table.require_columns(self.required)
    }
}
