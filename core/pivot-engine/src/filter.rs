//! FILENAME: core/pivot-engine/src/filter.rs
//! Filter evaluation.
//!
//! A filter targets either a raw field (evaluated per row before grouping)
//! or an aggregate key such as `sum_sales` (evaluated per group after
//! grouping). `partition_filters` decides which is which.

use table_model::{Row, Value};

use crate::definition::{FilterConfig, FilterOperator, MeasureConfig};

/// Filters split by the stage they apply to.
#[derive(Debug, Default)]
pub struct FilterPlan<'a> {
    pub row_filters: Vec<&'a FilterConfig>,
    pub aggregate_filters: Vec<&'a FilterConfig>,
    pub ignored: Vec<&'a FilterConfig>,
}

/// Classifies filters: an aggregate key of a selected measure is an
/// aggregate filter, a field present on some row is a row filter, anything
/// else is ignored.
pub fn partition_filters<'a>(
    filters: &'a [FilterConfig],
    measures: &[MeasureConfig],
    rows: &[Row],
) -> FilterPlan<'a> {
    let mut plan = FilterPlan::default();
    for filter in filters {
        if measures.iter().any(|m| m.agg_key() == filter.field) {
            plan.aggregate_filters.push(filter);
        } else if rows.iter().any(|row| row.contains(&filter.field)) {
            plan.row_filters.push(filter);
        } else {
            log::debug!("ignoring filter on unknown field '{}'", filter.field);
            plan.ignored.push(filter);
        }
    }
    plan
}

/// Tests one value against one filter.
pub fn matches(value: &Value, filter: &FilterConfig) -> bool {
    match filter.operator {
        FilterOperator::Equals => value.loose_eq(&filter.value),
        FilterOperator::Contains => value
            .display_value()
            .to_lowercase()
            .contains(&filter.value.display_value().to_lowercase()),
        FilterOperator::GreaterThan => compare_values(value, &filter.value)
            .map_or(false, |ord| ord == std::cmp::Ordering::Greater),
        FilterOperator::LessThan => compare_values(value, &filter.value)
            .map_or(false, |ord| ord == std::cmp::Ordering::Less),
    }
}

/// Numeric comparison when both sides are numeric, otherwise by display
/// text. Null never compares.
fn compare_values(value: &Value, target: &Value) -> Option<std::cmp::Ordering> {
    if value.is_null() || target.is_null() {
        return None;
    }
    match (value.numeric(), target.numeric()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(value.display_value().cmp(&target.display_value())),
    }
}

/// True when the row passes every filter (missing fields read as null).
pub fn row_matches(row: &Row, filters: &[&FilterConfig]) -> bool {
    filters.iter().all(|f| matches(row.value(&f.field), f))
}

/// True when an aggregate passes the filter; a missing aggregate fails.
pub fn aggregate_matches(aggregate: Option<f64>, filter: &FilterConfig) -> bool {
    match aggregate {
        Some(n) => matches(&Value::Number(n), filter),
        None => false,
    }
}
