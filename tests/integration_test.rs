//! End-to-end tests: paginated fetches, memoization and the dataset loaders
//! running against an in-memory row store.

mod common;

use approx::assert_relative_eq;
use biwenger_analytics::domain::cache::CachedFetcher;
use biwenger_analytics::domain::datasets::{DatasetSettings, Datasets, PlayerFilter};
use biwenger_analytics::domain::enrich::{enrich, EnrichConfig};
use biwenger_analytics::domain::error::AnalyticsError;
use biwenger_analytics::domain::fetcher::RowFetcher;
use biwenger_analytics::domain::query::FetchRequest;
use biwenger_analytics::domain::table::Table;
use biwenger_analytics::domain::value::Value;
use common::*;
use proptest::prelude::*;

fn ints(table: &Table, col: &str) -> Vec<i64> {
    table
        .rows()
        .iter()
        .map(|r| match r.get(col) {
            Value::Int(i) => *i,
            other => panic!("expected int in {col}, got {other:?}"),
        })
        .collect()
}

fn float(table: &Table, row: usize, col: &str) -> Option<f64> {
    match table.rows()[row].get(col) {
        Value::Float(f) => Some(*f),
        Value::Null => None,
        other => panic!("expected float in {col}, got {other:?}"),
    }
}

mod pagination {
    use super::*;

    proptest! {
        #[test]
        fn every_row_is_read_once_in_order(
            n in 0usize..250,
            page in 1usize..40,
            cap in proptest::option::of(1usize..60),
        ) {
            let mut store = MockRowStore::new().with_table("t", numbered_rows(n));
            if let Some(c) = cap {
                store = store.with_cap(c);
            }
            let table = RowFetcher::new(&store)
                .fetch(&FetchRequest::new("t").page_size(page))
                .unwrap();

            prop_assert_eq!(ints(&table, "n"), (0..n as i64).collect::<Vec<_>>());
            prop_assert!(!table.has_column("id"));

            let effective = cap.map_or(page, |c| c.min(page));
            prop_assert!(store.call_count() <= n / effective + 2);
        }
    }

    #[test]
    fn pages_never_overlap() {
        let store = MockRowStore::new()
            .with_table("t", numbered_rows(23))
            .with_cap(5);
        RowFetcher::new(&store)
            .fetch(&FetchRequest::new("t").page_size(10))
            .unwrap();

        let calls = store.calls.borrow();
        for pair in calls.windows(2) {
            assert!(pair[1].1 > pair[0].1, "start must advance: {calls:?}");
        }
        assert_eq!(calls[0], ("t".to_string(), 0, 9));
        assert_eq!(calls[1], ("t".to_string(), 5, 9));
    }

    #[test]
    fn transient_failure_returns_no_partial_table() {
        let store = MockRowStore::new()
            .with_table("t", numbered_rows(30))
            .failing_on_call(2);
        let result = RowFetcher::new(&store).fetch(&FetchRequest::new("t").page_size(10));
        match result {
            Err(AnalyticsError::TransientFetch { table, .. }) => assert_eq!(table, "t"),
            other => panic!("expected TransientFetch, got {other:?}"),
        }
        assert_eq!(store.call_count(), 2);
    }

    #[test]
    fn malformed_page_counts_as_empty() {
        let store = MockRowStore::new()
            .with_table("t", numbered_rows(30))
            .malformed_on_call(1);
        let table = RowFetcher::new(&store)
            .fetch(&FetchRequest::new("t").page_size(10))
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_table_is_reported() {
        let store = MockRowStore::new();
        let result = RowFetcher::new(&store).fetch(&FetchRequest::new("biwenger_missing"));
        assert!(matches!(result, Err(AnalyticsError::TableNotFound { .. })));
    }
}

mod enrichment {
    use super::*;

    proptest! {
        #[test]
        fn features_never_look_ahead(
            values in proptest::collection::vec(1.0f64..1e8, 2..40),
            cut in 1usize..40,
        ) {
            let len = values.len();
            let k = cut.min(len);
            let rows: Vec<Row> = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64);
                    value_row("Pedri", &date.format("%Y-%m-%d").to_string(), *v)
                })
                .collect();

            let config = EnrichConfig::default();
            let full = enrich(&Table::from_rows(rows.clone()), &config).unwrap();
            let prefix = enrich(&Table::from_rows(rows[..k].to_vec()), &config).unwrap();

            // Output is newest first, so the oldest k rows sit at the end.
            prop_assert_eq!(prefix.rows(), &full.rows()[len - k..]);
        }
    }
}

mod datasets {
    use super::*;

    #[test]
    fn market_value_is_grouped_and_newest_first() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());

        let market = datasets.market_value(&PlayerFilter::All).unwrap();
        let order: Vec<(String, String)> = market
            .rows()
            .iter()
            .map(|r| {
                (
                    r.get("player_name").to_string(),
                    r.get("date").to_string(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("Lewandowski".into(), "2024-10-02".into()),
                ("Lewandowski".into(), "2024-10-01".into()),
                ("Pedri".into(), "2024-10-03".into()),
                ("Pedri".into(), "2024-10-02".into()),
                ("Pedri".into(), "2024-10-01".into()),
            ]
        );

        assert_relative_eq!(float(&market, 2, "value_change_1").unwrap(), 1_000_000.0);
        assert_relative_eq!(
            float(&market, 2, "value_change_1_pct").unwrap(),
            100.0 * (62.0 / 61.0 - 1.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(float(&market, 2, "value_avg_7").unwrap(), 61_000_000.0);
        assert_eq!(float(&market, 2, "value_change_7"), None);
        assert_eq!(float(&market, 4, "value_change_1"), None);
        assert!(!market.has_column("id"));
    }

    #[test]
    fn market_value_filters_players() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());

        let market = datasets
            .market_value(&PlayerFilter::Only(vec!["Lewandowski".to_string()]))
            .unwrap();
        assert_eq!(market.len(), 2);
        assert!(market
            .rows()
            .iter()
            .all(|r| r.get("player_name") == &Value::from("Lewandowski")));
    }

    #[test]
    fn empty_player_list_matches_nobody() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());

        let market = datasets.market_value(&PlayerFilter::Only(Vec::new())).unwrap();
        assert!(market.is_empty());
        assert_eq!(PlayerFilter::from_names(&[]), PlayerFilter::All);
    }

    #[test]
    fn every_dataset_read_pages_by_unique_id() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());

        datasets
            .market_with_context(&PlayerFilter::from_names(&["Pedri".to_string()]))
            .unwrap();
        datasets.current_team_names().unwrap();

        let orders = store.orders.borrow();
        assert!(orders.len() >= 4);
        for (table, order) in orders.iter() {
            assert_eq!(
                order.as_ref(),
                Some(&("id".to_string(), true)),
                "unexpected ordering for {table}"
            );
        }
    }

    #[test]
    fn player_stats_carry_ratios_and_labels() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let stats = Datasets::new(&cache, DatasetSettings::default())
            .player_stats()
            .unwrap();

        assert_eq!(stats.rows()[0].get("position"), &Value::from("3 - Centrocampista"));
        assert_eq!(float(&stats, 0, "points_per_value"), Some(0.19));
        assert_eq!(float(&stats, 1, "points_per_value"), Some(0.79));
        assert_eq!(float(&stats, 2, "points_per_value"), None);
        assert_eq!(float(&stats, 0, "ratio_purchase_sales"), Some(3.0));
    }

    #[test]
    fn repeated_loads_hit_the_cache() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());

        datasets.player_stats().unwrap();
        let after_first = store.call_count();
        datasets.player_stats().unwrap();
        assert_eq!(store.call_count(), after_first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn current_team_names_are_sorted_and_unique() {
        let store = MockRowStore::new().with_table(
            "biwenger_current_team",
            vec![
                Row::new().with("name", "Pedri"),
                Row::new().with("name", "Araujo"),
                Row::new().with("name", "Pedri"),
            ],
        );
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let names = Datasets::new(&cache, DatasetSettings::default())
            .current_team_names()
            .unwrap();
        assert_eq!(names, vec!["Araujo", "Pedri"]);
    }

    #[test]
    fn market_with_context_joins_match_points() {
        let store = league_store();
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let joined = Datasets::new(&cache, DatasetSettings::default())
            .market_with_context(&PlayerFilter::Only(vec!["Pedri".to_string()]))
            .unwrap();

        assert_eq!(joined.len(), 3);
        assert!(joined.rows()[0].get("points").is_null());
        assert_eq!(joined.rows()[1].get("points"), &Value::Int(9));
        assert!(!joined.has_column("match_date"));
    }

    #[test]
    fn schema_violation_is_reported() {
        let store = MockRowStore::new().with_table(
            "biwenger_player_value",
            vec![Row::new().with("player_name", "Pedri").with("date", "2024-10-01")],
        );
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let result =
            Datasets::new(&cache, DatasetSettings::default()).market_value(&PlayerFilter::All);
        match result {
            Err(AnalyticsError::Schema { column }) => assert_eq!(column, "market_value_eur"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_tables_flow_through() {
        let store = MockRowStore::new()
            .with_table("biwenger_player_value", Vec::new())
            .with_table("biwenger_player_stats", Vec::new());
        let cache = CachedFetcher::new(RowFetcher::new(&store));
        let datasets = Datasets::new(&cache, DatasetSettings::default());
        assert!(datasets.market_value(&PlayerFilter::All).unwrap().is_empty());
        assert!(datasets.player_stats().unwrap().is_empty());
    }
}
