//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Table Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot table.
//! These structures are designed to be:
//! - Serializable (for saving/loading table layouts as JSON)
//! - Cheap to clone into state snapshots
//! - Immutable snapshots of user intent

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use table_model::{MeasureFormat, Row, Value};

use crate::formula::Formula;
use crate::inference::FieldType;
use crate::pagination::PaginationConfig;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggregationType {
    pub const ALL: [AggregationType; 5] = [
        AggregationType::Sum,
        AggregationType::Avg,
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::Count,
    ];

    /// Lowercase name used in aggregate keys and serialized configs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
        }
    }

    /// Parses an aggregation name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(AggregationType::Sum),
            "avg" | "average" => Some(AggregationType::Avg),
            "min" => Some(AggregationType::Min),
            "max" => Some(AggregationType::Max),
            "count" => Some(AggregationType::Count),
            _ => None,
        }
    }

    /// Capitalized name used in generated measure captions ("Sum of ...").
    pub fn caption(&self) -> &'static str {
        match self {
            AggregationType::Sum => "Sum",
            AggregationType::Avg => "Avg",
            AggregationType::Min => "Min",
            AggregationType::Max => "Max",
            AggregationType::Count => "Count",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name under which a group stores an aggregate, e.g. `sum_sales`.
pub fn agg_key(aggregation: AggregationType, unique_name: &str) -> String {
    format!("{}_{}", aggregation.as_str(), unique_name)
}

// ============================================================================
// AXES AND MEASURES
// ============================================================================

/// A field placed on the row or column axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisConfig {
    pub unique_name: String,
    pub caption: String,
}

impl AxisConfig {
    pub fn new(unique_name: impl Into<String>, caption: impl Into<String>) -> Self {
        AxisConfig {
            unique_name: unique_name.into(),
            caption: caption.into(),
        }
    }
}

/// A numeric field that is aggregated per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureConfig {
    pub unique_name: String,
    pub caption: String,
    #[serde(default)]
    pub aggregation: AggregationType,

    /// Display format; falls back to the table-level formatting map.
    #[serde(default)]
    pub format: Option<MeasureFormat>,

    /// When present, the per-row value is computed instead of read.
    #[serde(default)]
    pub formula: Option<Formula>,
}

impl MeasureConfig {
    pub fn new(
        unique_name: impl Into<String>,
        caption: impl Into<String>,
        aggregation: AggregationType,
    ) -> Self {
        MeasureConfig {
            unique_name: unique_name.into(),
            caption: caption.into(),
            aggregation,
            format: None,
            formula: None,
        }
    }

    pub fn with_format(mut self, format: MeasureFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }

    /// The aggregate key this measure is stored under in a group.
    pub fn agg_key(&self) -> String {
        agg_key(self.aggregation, &self.unique_name)
    }

    /// Per-row numeric value: the formula result, or the field coerced to a number.
    pub fn row_value(&self, row: &Row) -> f64 {
        match &self.formula {
            Some(formula) => formula.evaluate(row),
            None => row.value(&self.unique_name).as_number(),
        }
    }
}

/// A field descriptor offered to the field chooser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub field: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl Dimension {
    pub fn new(field: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Dimension {
            field: field.into(),
            label: label.into(),
            field_type,
        }
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Label used for missing group-key values unless configured otherwise.
pub const DEFAULT_MISSING_PLACEHOLDER: &str = "N/A";

fn default_missing_placeholder() -> String {
    DEFAULT_MISSING_PLACEHOLDER.to_string()
}

/// Explicit grouping: row fields followed by column fields form the group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    #[serde(default)]
    pub row_fields: Vec<String>,
    #[serde(default)]
    pub column_fields: Vec<String>,
    #[serde(default = "default_missing_placeholder")]
    pub missing_placeholder: String,
}

impl GroupConfig {
    pub fn new(row_fields: Vec<String>, column_fields: Vec<String>) -> Self {
        GroupConfig {
            row_fields,
            column_fields,
            missing_placeholder: default_missing_placeholder(),
        }
    }

    pub fn with_missing_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.missing_placeholder = placeholder.into();
        self
    }

    /// Row fields then column fields, the order components appear in a key.
    pub fn key_fields(&self) -> impl Iterator<Item = &str> {
        self.row_fields
            .iter()
            .chain(self.column_fields.iter())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.row_fields.is_empty() && self.column_fields.is_empty()
    }
}

// ============================================================================
// SORTING AND FILTERING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One entry of the sort history; the last entry is the active sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfig {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortConfig {
            field: field.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterConfig {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        FilterConfig {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

// ============================================================================
// TABLE CONFIGURATION
// ============================================================================

/// Whether the table shows source rows or aggregated groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataHandlingMode {
    Raw,
    #[default]
    Processed,
}

fn default_page_size() -> usize {
    PaginationConfig::DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

/// The complete configuration a pivot engine is built from.
///
/// `reset` restores the engine to exactly this configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTableConfig {
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub rows: Vec<AxisConfig>,
    #[serde(default)]
    pub columns: Vec<AxisConfig>,
    #[serde(default)]
    pub measures: Vec<MeasureConfig>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub default_aggregation: AggregationType,
    #[serde(default)]
    pub group_config: Option<GroupConfig>,
    #[serde(default)]
    pub data_handling_mode: DataHandlingMode,
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-measure display formats, keyed by measure unique name.
    #[serde(default)]
    pub formatting: BTreeMap<String, MeasureFormat>,

    #[serde(default = "default_true")]
    pub is_responsive: bool,
}

impl Default for PivotTableConfig {
    fn default() -> Self {
        PivotTableConfig {
            data: Vec::new(),
            rows: Vec::new(),
            columns: Vec::new(),
            measures: Vec::new(),
            dimensions: Vec::new(),
            default_aggregation: AggregationType::Sum,
            group_config: None,
            data_handling_mode: DataHandlingMode::Processed,
            page_size: PaginationConfig::DEFAULT_PAGE_SIZE,
            formatting: BTreeMap::new(),
            is_responsive: true,
        }
    }
}

impl PivotTableConfig {
    /// Creates a configuration over `data` with no layout.
    pub fn new(data: Vec<Row>) -> Self {
        PivotTableConfig {
            data,
            ..Default::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<AxisConfig>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_columns(mut self, columns: Vec<AxisConfig>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_measures(mut self, measures: Vec<MeasureConfig>) -> Self {
        self.measures = measures;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_group_config(mut self, group_config: GroupConfig) -> Self {
        self.group_config = Some(group_config);
        self
    }

    pub fn with_mode(mut self, mode: DataHandlingMode) -> Self {
        self.data_handling_mode = mode;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_default_aggregation(mut self, aggregation: AggregationType) -> Self {
        self.default_aggregation = aggregation;
        self
    }

    pub fn with_format(mut self, measure: impl Into<String>, format: MeasureFormat) -> Self {
        self.formatting.insert(measure.into(), format);
        self
    }

    /// Parses a configuration from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
