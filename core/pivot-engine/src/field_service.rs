//! FILENAME: core/pivot-engine/src/field_service.rs
//! Field discovery and layout helpers for field-chooser UIs.

use serde::{Deserialize, Serialize};

use crate::definition::{AggregationType, AxisConfig, MeasureConfig};
use crate::engine::PivotEngine;
use crate::error::PivotError;
use crate::inference::{collect_field_names, infer_sampled_type, FieldType, TYPE_SAMPLE_SIZE};

/// A source field and its inferred type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Which fields a user placed on which axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    #[serde(default)]
    pub rows: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// (field, aggregation) pairs.
    #[serde(default)]
    pub measures: Vec<(String, AggregationType)>,
}

/// Axis and measure configs ready for `PivotEngine::set_layout`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub rows: Vec<AxisConfig>,
    pub columns: Vec<AxisConfig>,
    pub measures: Vec<MeasureConfig>,
}

/// Fields of the engine's raw data with inferred types, sorted by name.
/// Types are inferred from the first 200 rows.
pub fn available_fields(engine: &PivotEngine) -> Vec<FieldInfo> {
    let rows = &engine.state().raw_data;
    let sample = &rows[..rows.len().min(TYPE_SAMPLE_SIZE)];
    let mut fields: Vec<FieldInfo> = collect_field_names(sample)
        .into_iter()
        .map(|name| FieldInfo {
            field_type: infer_sampled_type(sample, &name),
            name,
        })
        .collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    fields
}

/// "unit_price", "unitPrice" and "unit-price" all become "Unit Price".
pub fn humanize_field_name(field: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in field.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Caption for a generated measure, e.g. "Sum of Unit Price".
pub fn measure_caption(field: &str, aggregation: AggregationType) -> String {
    format!("{} of {}", aggregation.caption(), humanize_field_name(field))
}

pub fn build_measure(field: &str, aggregation: AggregationType) -> MeasureConfig {
    MeasureConfig::new(field, measure_caption(field, aggregation), aggregation)
}

/// One-to-one conversion of a selection into axis and measure configs.
pub fn build_layout(selection: &FieldSelection) -> Layout {
    let axis = |field: &String| AxisConfig::new(field.clone(), humanize_field_name(field));
    Layout {
        rows: selection.rows.iter().map(axis).collect(),
        columns: selection.columns.iter().map(axis).collect(),
        measures: selection
            .measures
            .iter()
            .map(|(field, aggregation)| build_measure(field, *aggregation))
            .collect(),
    }
}

/// Changes the aggregation of a selected measure, or appends a new measure
/// for the field. A generated caption follows the new aggregation.
pub fn set_measure_aggregation(
    engine: &mut PivotEngine,
    field: &str,
    aggregation: AggregationType,
) -> Result<(), PivotError> {
    let mut measures = engine.state().selected_measures.clone();
    match measures.iter_mut().find(|m| m.unique_name == field) {
        Some(measure) => {
            if measure.caption == measure_caption(field, measure.aggregation) {
                measure.caption = measure_caption(field, aggregation);
            }
            measure.aggregation = aggregation;
        }
        None => measures.push(build_measure(field, aggregation)),
    }
    engine.set_measures(measures)
}
