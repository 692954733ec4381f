//! FILENAME: tests/test_properties.rs
//! Property tests for the aggregation, sorting, grouping and paging rules.

mod common;

use proptest::prelude::*;

use pivot_engine::{
    aggregate, group_rows, sort_rows, AggregationType, AxisConfig, GroupConfig, MeasureConfig,
    PaginationConfig, PivotEngine, PivotTableConfig, SortConfig, SortDirection,
};
use table_model::{row, Row, Value};

const CASES: u32 = 64;

fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["US", "FR", "DE", "JP"]),
            prop::sample::select(vec!["X", "Y", "Z"]),
            prop::option::of(-1_000i32..1_000),
        ),
        0..40,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (country, cat, price))| {
                let mut r = row! { "id" => i, "country" => country, "cat" => cat };
                if let Some(p) = price {
                    r.insert("price", p);
                }
                r
            })
            .collect()
    })
}

fn ids(rows: &[Row]) -> Vec<f64> {
    rows.iter().map(|r| r.value("id").as_number()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(CASES))]

    #[test]
    fn prop_aggregates_match_definitions(rows in arb_rows()) {
        let values: Vec<f64> = rows.iter().map(|r| r.value("price").as_number()).collect();
        let sum: f64 = values.iter().sum();
        prop_assert_eq!(aggregate(&rows, "price", AggregationType::Sum), sum);
        prop_assert_eq!(aggregate(&rows, "price", AggregationType::Count), rows.len() as f64);
        if rows.is_empty() {
            prop_assert_eq!(aggregate(&rows, "price", AggregationType::Avg), 0.0);
            prop_assert_eq!(aggregate(&rows, "price", AggregationType::Min), 0.0);
        } else {
            prop_assert_eq!(aggregate(&rows, "price", AggregationType::Avg), sum / rows.len() as f64);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(aggregate(&rows, "price", AggregationType::Min), min);
            prop_assert_eq!(aggregate(&rows, "price", AggregationType::Max), max);
        }
    }

    #[test]
    fn prop_sort_is_idempotent(rows in arb_rows(), desc in any::<bool>()) {
        let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
        let config = SortConfig::new("price", direction);
        let once = sort_rows(&rows, &config);
        let twice = sort_rows(&once, &config);
        prop_assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn prop_reversing_direction_reverses_distinct_keys(rows in arb_rows()) {
        let asc = sort_rows(&rows, &SortConfig::new("id", SortDirection::Asc));
        let mut desc = sort_rows(&rows, &SortConfig::new("id", SortDirection::Desc));
        desc.reverse();
        prop_assert_eq!(ids(&asc), ids(&desc));
    }

    #[test]
    fn prop_sort_on_missing_field_is_identity(rows in arb_rows()) {
        let out = sort_rows(&rows, &SortConfig::new("missing", SortDirection::Desc));
        prop_assert_eq!(out, rows);
    }

    #[test]
    fn prop_grouping_partitions_rows(rows in arb_rows()) {
        let config = GroupConfig::new(vec!["country".into()], vec!["cat".into()]);
        let measures = [MeasureConfig::new("price", "Sum of Price", AggregationType::Sum)];
        let groups = group_rows(&rows, Some(&config), &measures);

        let total: usize = groups.iter().map(|g| g.items.len()).sum();
        prop_assert_eq!(total, rows.len());

        let mut keys: Vec<String> = rows
            .iter()
            .map(|r| format!("{}|{}", r.value("country").display_value(), r.value("cat").display_value()))
            .collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(groups.len(), keys.len());

        for group in &groups {
            prop_assert_eq!(
                group.aggregate("sum_price"),
                Some(aggregate(&group.items, "price", AggregationType::Sum))
            );
        }
    }

    #[test]
    fn prop_current_page_stays_in_range(
        rows in arb_rows(),
        page_size in 1usize..8,
        page in 0usize..20,
        drop_us in any::<bool>(),
    ) {
        let config = PivotTableConfig::new(rows.clone())
            .with_rows(vec![AxisConfig::new("id", "Id")])
            .with_measures(vec![MeasureConfig::new("price", "Sum of Price", AggregationType::Sum)]);
        let mut engine = PivotEngine::new(config);
        engine.set_pagination(PaginationConfig { current_page: page, page_size, total_pages: 1 }).unwrap();
        if drop_us {
            engine.apply_filters(vec![pivot_engine::FilterConfig::new(
                "country",
                pivot_engine::FilterOperator::Equals,
                Value::from("FR"),
            )]).unwrap();
        }

        let p = engine.state().pagination_config;
        let items = engine.row_members().len();
        prop_assert_eq!(p.total_pages, std::cmp::max(1, items.div_ceil(page_size)));
        prop_assert!(p.current_page >= 1 && p.current_page <= p.total_pages);
        prop_assert!(engine.state().processed_data.rows.len() <= page_size);
    }

    #[test]
    fn prop_row_swap_is_self_inverse(rows in arb_rows(), i in 0usize..4, j in 0usize..4) {
        let config = PivotTableConfig::new(rows)
            .with_rows(vec![AxisConfig::new("country", "Country")])
            .with_measures(vec![MeasureConfig::new("price", "Sum of Price", AggregationType::Sum)]);
        let mut engine = PivotEngine::new(config);
        let before = engine.row_members().to_vec();
        engine.swap_data_rows(i, j).unwrap();
        engine.swap_data_rows(i, j).unwrap();
        prop_assert_eq!(engine.row_members().to_vec(), before);
    }
}
