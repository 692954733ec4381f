//! FILENAME: core/pivot-engine/src/auto_layout.rs
//! PURPOSE: Guess a sensible pivot layout for freshly imported data.
//! CONTEXT: Numeric columns become `sum` measures. Low-cardinality text
//! columns become the row and column axes, preferring names that look like a
//! row dimension (region, country, ...) or a column dimension (product, month,
//! ...). When no second axis exists a constant `__all__` axis is synthesized.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use table_model::{KeyValue, MeasureFormat, Row, Value};

use crate::definition::{AggregationType, AxisConfig, MeasureConfig};
use crate::inference::{
    collect_field_names, detect_currency_symbol, infer_sampled_type, parse_currency_to_number,
    FieldType, TYPE_SAMPLE_SIZE,
};

/// Name of the synthesized constant axis field.
pub const ALL_FIELD: &str = "__all__";
/// Value (and caption) of the synthesized constant axis.
pub const ALL_VALUE: &str = "All";

/// Row count above which cardinality is estimated from a sample.
pub const CARDINALITY_SAMPLING_THRESHOLD: usize = 10_000;
pub const CARDINALITY_SAMPLE_SIZE: usize = 5_000;
/// Highest cardinality a column may have to become an axis.
pub const MAX_AXIS_CARDINALITY: usize = 100;

const SAMPLE_SEED: u64 = 0x5EED_CA4D_1A11_7E57;

const ROW_HINTS: [&str; 6] = ["region", "country", "state", "city", "category", "department"];
const COLUMN_HINTS: [&str; 6] = ["product", "item", "month", "quarter", "year", "type"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoLayout {
    pub rows: Vec<AxisConfig>,
    pub columns: Vec<AxisConfig>,
    pub measures: Vec<MeasureConfig>,
    /// Copies of the input rows with `__all__` added where synthesized and
    /// measure columns normalized to numbers.
    pub data: Vec<Row>,
}

fn all_axis() -> AxisConfig {
    AxisConfig::new(ALL_FIELD, ALL_VALUE)
}

fn axis(field: &str) -> AxisConfig {
    AxisConfig::new(field, field)
}

/// Builds a layout for rows of unknown shape. The input is not modified.
pub fn build_auto_layout(rows: &[Row]) -> AutoLayout {
    if rows.is_empty() {
        return AutoLayout::default();
    }

    let columns = collect_field_names(rows);
    let (numeric, other): (Vec<String>, Vec<String>) = columns
        .into_iter()
        .partition(|c| infer_sampled_type(rows, c) == FieldType::Number);

    let (row_axis, column_axis) = if numeric.len() + other.len() == 1 {
        match other.first() {
            Some(field) => (vec![axis(field)], vec![all_axis()]),
            None => (vec![all_axis()], vec![all_axis()]),
        }
    } else if other.is_empty() {
        (vec![all_axis()], vec![all_axis()])
    } else {
        choose_axes(rows, &other)
    };

    let measures: Vec<MeasureConfig> = numeric.iter().map(|c| build_sum_measure(rows, c)).collect();
    let synthesize = row_axis
        .iter()
        .chain(column_axis.iter())
        .any(|a| a.unique_name == ALL_FIELD);

    log::info!(
        "auto layout: rows={:?} columns={:?} measures={}",
        row_axis.iter().map(|a| &a.unique_name).collect::<Vec<_>>(),
        column_axis.iter().map(|a| &a.unique_name).collect::<Vec<_>>(),
        measures.len()
    );

    AutoLayout {
        data: augment_rows(rows, &numeric, synthesize),
        rows: row_axis,
        columns: column_axis,
        measures,
    }
}

/// Picks row and column axes among the non-numeric columns.
fn choose_axes(rows: &[Row], candidates: &[String]) -> (Vec<AxisConfig>, Vec<AxisConfig>) {
    let total = rows.len();
    let cardinalities = estimate_cardinalities(rows, candidates);
    let ranked: Vec<(&str, usize)> = candidates
        .iter()
        .map(String::as_str)
        .zip(cardinalities)
        .collect();

    let eligible: Vec<(&str, usize)> = ranked
        .iter()
        .copied()
        .filter(|(_, c)| *c > 1 && *c < total && *c <= MAX_AXIS_CARDINALITY)
        .collect();

    match eligible.len() {
        1 => (vec![axis(eligible[0].0)], vec![all_axis()]),
        0 if ranked.len() == 1 => (vec![axis(ranked[0].0)], vec![all_axis()]),
        0 => pick_pair(ranked),
        _ => pick_pair(eligible),
    }
}

fn has_hint(field: &str, hints: &[&str]) -> bool {
    let lower = field.to_lowercase();
    hints.iter().any(|h| lower.contains(h))
}

/// Takes the two lowest-cardinality columns, then assigns the row role by
/// row-ish name, column role by column-ish name, else alphabetically.
fn pick_pair(mut ranked: Vec<(&str, usize)>) -> (Vec<AxisConfig>, Vec<AxisConfig>) {
    ranked.sort_by(|(a, ca), (b, cb)| {
        let hinted = |f: &str| !(has_hint(f, &ROW_HINTS) || has_hint(f, &COLUMN_HINTS));
        ca.cmp(cb)
            .then_with(|| hinted(*a).cmp(&hinted(*b)))
            .then_with(|| a.cmp(b))
    });
    let (first, second) = (ranked[0].0, ranked[1].0);

    let (row, column) = if has_hint(first, &ROW_HINTS) && !has_hint(second, &ROW_HINTS) {
        (first, second)
    } else if has_hint(second, &ROW_HINTS) && !has_hint(first, &ROW_HINTS) {
        (second, first)
    } else if has_hint(first, &COLUMN_HINTS) && !has_hint(second, &COLUMN_HINTS) {
        (second, first)
    } else if has_hint(second, &COLUMN_HINTS) && !has_hint(first, &COLUMN_HINTS) {
        (first, second)
    } else if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    (vec![axis(row)], vec![axis(column)])
}

fn build_sum_measure(rows: &[Row], field: &str) -> MeasureConfig {
    let sample = &rows[..rows.len().min(TYPE_SAMPLE_SIZE)];
    let currency = sample.iter().find_map(|row| match row.value(field) {
        Value::Text(text) => detect_currency_symbol(text),
        _ => None,
    });
    let format = match currency.and_then(table_model::currency_code_for_symbol) {
        Some(code) => MeasureFormat::currency(code, 2),
        None => MeasureFormat::number(2),
    };
    MeasureConfig::new(field, format!("Sum of {}", field), AggregationType::Sum).with_format(format)
}

fn augment_rows(rows: &[Row], numeric: &[String], synthesize: bool) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            for field in numeric {
                if let Some(Value::Text(text)) = row.get(field) {
                    if let Some(n) = parse_currency_to_number(text) {
                        out.insert(field.as_str(), n);
                    }
                }
            }
            if synthesize {
                out.insert(ALL_FIELD, ALL_VALUE);
            }
            out
        })
        .collect()
}

// ============================================================================
// CARDINALITY ESTIMATION
// ============================================================================

/// Distinct-value count of a column, estimated from a seeded sample when the
/// dataset has more than 10,000 rows.
pub fn estimate_cardinality(rows: &[Row], field: &str) -> usize {
    estimate_cardinalities(rows, &[field.to_string()])
        .pop()
        .unwrap_or(0)
}

fn estimate_cardinalities(rows: &[Row], fields: &[String]) -> Vec<usize> {
    let total = rows.len();
    if total <= CARDINALITY_SAMPLING_THRESHOLD {
        return fields
            .iter()
            .map(|field| {
                rows.iter()
                    .map(|row| KeyValue::from(row.value(field)))
                    .collect::<FxHashSet<_>>()
                    .len()
            })
            .collect();
    }

    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let picks = rand::seq::index::sample(&mut rng, total, CARDINALITY_SAMPLE_SIZE);
    let scale = total as f64 / CARDINALITY_SAMPLE_SIZE as f64;
    fields
        .iter()
        .map(|field| {
            let unique = picks
                .iter()
                .map(|i| KeyValue::from(rows[i].value(field)))
                .collect::<FxHashSet<_>>()
                .len();
            ((unique as f64 * scale).round() as usize).min(total)
        })
        .collect()
}
