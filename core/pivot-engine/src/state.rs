//! FILENAME: core/pivot-engine/src/state.rs
//! The engine's complete observable state.
//!
//! Subscribers and export sinks read this snapshot; only the engine mutates it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use table_model::{MeasureFormat, Row};

use crate::cache::{Group, GroupKey};
use crate::definition::{
    AggregationType, AxisConfig, DataHandlingMode, Dimension, FilterConfig, GroupConfig,
    MeasureConfig, PivotTableConfig, SortConfig,
};
use crate::pagination::PaginationConfig;
use crate::view::ProcessedData;

/// Minimum row height accepted by `resize_row`.
pub const MIN_ROW_HEIGHT: f64 = 20.0;

/// What produced a custom member order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderOrigin {
    /// Derived from a measure sort; recomputed on every derivation.
    Sort,
    /// Set explicitly (custom order, swap); wins until the next sort.
    Manual,
}

/// An explicit ordering of axis members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOrder {
    /// Axis fields the members were taken from; the order only applies while
    /// the axis still has exactly these fields.
    pub fields: Vec<String>,
    pub members: Vec<GroupKey>,
    pub origin: OrderOrigin,
}

impl CustomOrder {
    pub fn manual(fields: Vec<String>, members: Vec<GroupKey>) -> Self {
        CustomOrder {
            fields,
            members,
            origin: OrderOrigin::Manual,
        }
    }

    pub fn applies_to(&self, fields: &[String]) -> bool {
        self.fields == fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTableState {
    pub raw_data: Vec<Row>,
    /// Raw rows after row filters and row-level sorting.
    pub data: Vec<Row>,
    pub processed_data: ProcessedData,
    pub data_handling_mode: DataHandlingMode,
    pub rows: Vec<AxisConfig>,
    pub columns: Vec<AxisConfig>,
    pub measures: Vec<MeasureConfig>,
    pub selected_measures: Vec<MeasureConfig>,
    pub dimensions: Vec<Dimension>,
    pub selected_aggregation: AggregationType,
    pub group_config: Option<GroupConfig>,
    pub groups: Vec<Group>,
    /// Sort history; the last entry is active.
    pub sort_config: Vec<SortConfig>,
    pub filter_config: Vec<FilterConfig>,
    pub pagination_config: PaginationConfig,
    pub custom_row_order: Option<CustomOrder>,
    pub custom_column_order: Option<CustomOrder>,
    pub row_sizes: BTreeMap<usize, f64>,
    pub expanded_rows: BTreeSet<String>,
    pub formatting: BTreeMap<String, MeasureFormat>,
    pub is_responsive: bool,
}

impl PivotTableState {
    /// Initial (not yet derived) state for a configuration.
    pub fn from_config(config: &PivotTableConfig) -> Self {
        let mut formatting = config.formatting.clone();
        for measure in &config.measures {
            if let Some(format) = &measure.format {
                formatting
                    .entry(measure.unique_name.clone())
                    .or_insert_with(|| format.clone());
            }
        }

        PivotTableState {
            raw_data: config.data.clone(),
            data: Vec::new(),
            processed_data: ProcessedData::default(),
            data_handling_mode: config.data_handling_mode,
            rows: config.rows.clone(),
            columns: config.columns.clone(),
            measures: config.measures.clone(),
            selected_measures: config.measures.clone(),
            dimensions: config.dimensions.clone(),
            selected_aggregation: config.default_aggregation,
            group_config: config.group_config.clone(),
            groups: Vec::new(),
            sort_config: Vec::new(),
            filter_config: Vec::new(),
            pagination_config: PaginationConfig::new(config.page_size),
            custom_row_order: None,
            custom_column_order: None,
            row_sizes: BTreeMap::new(),
            expanded_rows: BTreeSet::new(),
            formatting,
            is_responsive: config.is_responsive,
        }
    }

    /// The active sort, if any.
    pub fn active_sort(&self) -> Option<&SortConfig> {
        self.sort_config.last()
    }

    /// Grouping used for processed output: the explicit config, or one built
    /// from the axis lists. `None` when there is nothing to group by.
    pub fn effective_group_config(&self) -> Option<GroupConfig> {
        if let Some(config) = &self.group_config {
            return Some(config.clone());
        }
        let config = GroupConfig::new(
            self.rows.iter().map(|a| a.unique_name.clone()).collect(),
            self.columns.iter().map(|a| a.unique_name.clone()).collect(),
        );
        if config.is_empty() {
            None
        } else {
            Some(config)
        }
    }

    /// Caption of an axis field, falling back to the field name.
    pub fn axis_caption(&self, field: &str) -> String {
        self.rows
            .iter()
            .chain(self.columns.iter())
            .find(|a| a.unique_name == field)
            .map(|a| a.caption.clone())
            .unwrap_or_else(|| field.to_string())
    }

    pub fn find_measure(&self, name: &str) -> Option<&MeasureConfig> {
        self.selected_measures
            .iter()
            .find(|m| m.unique_name == name || m.agg_key() == name)
    }

    /// Snapshot as JSON for export sinks.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
