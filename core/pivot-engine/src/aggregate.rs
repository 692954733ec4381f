//! FILENAME: core/pivot-engine/src/aggregate.rs
//! Aggregation of measure values over a set of rows.

use table_model::Row;

use crate::definition::{AggregationType, MeasureConfig};

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Running state for one aggregate; a single pass feeds every aggregation kind.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    pub sum: f64,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        AggregateAccumulator::default()
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Computes the final aggregate value. An empty accumulator yields 0.
    pub fn compute(&self, aggregation: AggregationType) -> f64 {
        match aggregation {
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.count as f64,
            AggregationType::Avg => {
                if self.count > 0 {
                    self.sum / (self.count as f64)
                } else {
                    0.0
                }
            }
            AggregationType::Min => self.min.unwrap_or(0.0),
            AggregationType::Max => self.max.unwrap_or(0.0),
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Aggregates `field` over `items`. Non-numeric values read as 0, and every
/// item counts (including those whose value is missing).
pub fn aggregate(items: &[Row], field: &str, aggregation: AggregationType) -> f64 {
    aggregate_with(items.iter(), |row| row.value(field).as_number(), aggregation)
}

/// Like [`aggregate`] but with the aggregation given by name. Unknown names
/// yield 0.
pub fn aggregate_by_name(items: &[Row], field: &str, aggregation: &str) -> f64 {
    match AggregationType::parse(aggregation) {
        Some(aggregation) => aggregate(items, field, aggregation),
        None => {
            log::debug!("unknown aggregation '{}' for field '{}'", aggregation, field);
            0.0
        }
    }
}

/// Aggregates a measure, honoring its formula.
pub fn aggregate_measure<'a>(
    items: impl IntoIterator<Item = &'a Row>,
    measure: &MeasureConfig,
) -> f64 {
    aggregate_with(items, |row| measure.row_value(row), measure.aggregation)
}

fn aggregate_with<'a, F>(
    items: impl IntoIterator<Item = &'a Row>,
    value_of: F,
    aggregation: AggregationType,
) -> f64
where
    F: Fn(&Row) -> f64,
{
    let mut acc = AggregateAccumulator::new();
    for row in items {
        acc.add(value_of(row));
    }
    acc.compute(aggregation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;
    use table_model::row;

    fn prices() -> Vec<Row> {
        vec![
            row! { "price" => 10.0 },
            row! { "price" => "20" },
            row! { "price" => "n/a" },
            row! { "other" => 1.0 },
        ]
    }

    #[test]
    fn coerces_non_numeric_values_to_zero() {
        let items = prices();
        assert_eq!(aggregate(&items, "price", AggregationType::Sum), 30.0);
        assert_eq!(aggregate(&items, "price", AggregationType::Count), 4.0);
        assert_eq!(aggregate(&items, "price", AggregationType::Avg), 7.5);
        assert_eq!(aggregate(&items, "price", AggregationType::Min), 0.0);
        assert_eq!(aggregate(&items, "price", AggregationType::Max), 20.0);
    }

    #[test]
    fn empty_items_aggregate_to_zero() {
        for agg in AggregationType::ALL {
            assert_eq!(aggregate(&[], "price", agg), 0.0);
        }
    }

    #[test]
    fn unknown_aggregation_name_is_zero() {
        assert_eq!(aggregate_by_name(&prices(), "price", "median"), 0.0);
        assert_eq!(aggregate_by_name(&prices(), "price", "max"), 20.0);
    }

    #[test]
    fn measures_use_their_formula() {
        let items = vec![
            row! { "price" => 2.0, "qty" => 3.0 },
            row! { "price" => 5.0, "qty" => 1.0 },
        ];
        let revenue = MeasureConfig::new("revenue", "Revenue", AggregationType::Sum).with_formula(
            Formula::Product {
                left: "price".into(),
                right: "qty".into(),
            },
        );
        assert_eq!(aggregate_measure(&items, &revenue), 11.0);
    }
}
