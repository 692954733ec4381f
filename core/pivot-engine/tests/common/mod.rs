//! FILENAME: tests/common/mod.rs
//! Fixtures shared by the pivot-engine integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use pivot_engine::{
    AggregationType, AxisConfig, MeasureConfig, PivotEngine, PivotTableConfig, PivotTableState,
};
use table_model::{row, Row};

/// Small sales dataset: (region, product, quarter, sales, quantity).
pub struct SalesFixture;

impl SalesFixture {
    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("East", "Apples", "Q1", 100.0, 10.0),
            ("East", "Oranges", "Q1", 150.0, 15.0),
            ("West", "Apples", "Q1", 200.0, 20.0),
            ("West", "Oranges", "Q2", 50.0, 5.0),
            ("North", "Apples", "Q2", 75.0, 7.0),
            ("East", "Apples", "Q2", 120.0, 12.0),
        ]
    }

    pub fn rows() -> Vec<Row> {
        Self::data()
            .into_iter()
            .map(|(region, product, quarter, sales, quantity)| {
                row! {
                    "region" => region,
                    "product" => product,
                    "quarter" => quarter,
                    "sales" => sales,
                    "quantity" => quantity,
                }
            })
            .collect()
    }

    /// region on rows, product on columns, sum of sales.
    pub fn config() -> PivotTableConfig {
        PivotTableConfig::new(Self::rows())
            .with_rows(vec![AxisConfig::new("region", "Region")])
            .with_columns(vec![AxisConfig::new("product", "Product")])
            .with_measures(vec![MeasureConfig::new(
                "sales",
                "Sum of Sales",
                AggregationType::Sum,
            )])
    }
}

/// The three-row country/category dataset.
pub fn country_rows() -> Vec<Row> {
    vec![
        row! { "country" => "US", "cat" => "X", "price" => 10.0 },
        row! { "country" => "US", "cat" => "Y", "price" => 20.0 },
        row! { "country" => "FR", "cat" => "X", "price" => 5.0 },
    ]
}

/// Labels of the engine's row members, in display order.
pub fn row_labels(engine: &PivotEngine) -> Vec<String> {
    engine.row_members().iter().map(|m| m.label()).collect()
}

pub fn column_labels(engine: &PivotEngine) -> Vec<String> {
    engine.column_members().iter().map(|m| m.label()).collect()
}

/// Subscribes a recorder that keeps every state it is handed.
pub fn record_states(engine: &mut PivotEngine) -> Rc<RefCell<Vec<PivotTableState>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    engine
        .subscribe(move |state| {
            sink.borrow_mut().push(state.clone());
            Ok(())
        })
        .unwrap();
    seen
}

/// Routes `log` output to the test harness when RUST_LOG is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
