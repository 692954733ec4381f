//! FILENAME: core/pivot-engine/src/cache.rs
//! Grouped representation of the source rows.
//!
//! Rows are bucketed by a composite key built from the row-axis fields
//! followed by the column-axis fields. Each bucket keeps its member rows and
//! the pre-computed aggregates of every selected measure, so the view can be
//! assembled by key lookup alone.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use table_model::{KeyValue, Row};

use crate::aggregate::aggregate_measure;
use crate::definition::{GroupConfig, MeasureConfig};

// ============================================================================
// GROUP KEYS
// ============================================================================

/// Inline storage for key components; axes rarely exceed four fields.
pub type KeyParts = SmallVec<[KeyValue; 4]>;

/// A key representing a unique combination of axis field values.
/// Also used on its own for row-axis and column-axis members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey {
    pub values: KeyParts,
}

impl GroupKey {
    pub fn new(values: impl IntoIterator<Item = KeyValue>) -> Self {
        GroupKey {
            values: values.into_iter().collect(),
        }
    }

    pub fn single(value: impl Into<KeyValue>) -> Self {
        GroupKey::new([value.into()])
    }

    /// Reads `fields` from the row, substituting `placeholder` for missing
    /// or null values.
    pub fn from_row<'a>(
        row: &Row,
        fields: impl IntoIterator<Item = &'a str>,
        placeholder: &str,
    ) -> Self {
        let values = fields
            .into_iter()
            .map(|field| match row.get(field) {
                Some(value) if !value.is_null() => KeyValue::from(value),
                _ => KeyValue::Text(placeholder.to_string()),
            })
            .collect();
        GroupKey { values }
    }

    /// Splits into (row part, column part) at `row_len`.
    pub fn split(&self, row_len: usize) -> (GroupKey, GroupKey) {
        let at = row_len.min(self.values.len());
        (
            GroupKey {
                values: self.values[..at].iter().cloned().collect(),
            },
            GroupKey {
                values: self.values[at..].iter().cloned().collect(),
            },
        )
    }

    /// Concatenates a row member and a column member into a full key.
    pub fn join(row: &GroupKey, column: &GroupKey) -> GroupKey {
        GroupKey {
            values: row.values.iter().chain(column.values.iter()).cloned().collect(),
        }
    }

    /// Component labels joined with " - ".
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(KeyValue::label)
            .collect::<Vec<_>>()
            .join(" - ")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Component-wise natural ordering.
    pub fn compare(&self, other: &GroupKey) -> std::cmp::Ordering {
        for (a, b) in self.values.iter().zip(other.values.iter()) {
            let ord = a.compare(b);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        self.values.len().cmp(&other.values.len())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ============================================================================
// GROUPS
// ============================================================================

/// One bucket of rows sharing a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub key: GroupKey,
    pub items: Vec<Row>,
    /// Aggregates keyed by `{aggregation}_{measure}`.
    pub aggregates: FxHashMap<String, f64>,
}

impl Group {
    pub fn aggregate(&self, agg_key: &str) -> Option<f64> {
        self.aggregates.get(agg_key).copied()
    }

    /// The row-axis part of this group's key.
    pub fn row_key(&self, row_len: usize) -> GroupKey {
        self.split_key(row_len).0
    }

    pub fn split_key(&self, row_len: usize) -> (GroupKey, GroupKey) {
        self.key.split(row_len)
    }
}

/// Buckets rows by the configured key fields, in first-seen key order, and
/// computes every measure's aggregate per bucket.
///
/// Without a config there is nothing to group by and the result is empty.
pub fn group_rows(
    rows: &[Row],
    config: Option<&GroupConfig>,
    measures: &[MeasureConfig],
) -> Vec<Group> {
    let Some(config) = config else {
        return Vec::new();
    };

    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut groups: Vec<Group> = Vec::new();

    for row in rows {
        let key = GroupKey::from_row(row, config.key_fields(), &config.missing_placeholder);
        match index.get(&key) {
            Some(&slot) => groups[slot].items.push(row.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    items: vec![row.clone()],
                    aggregates: FxHashMap::default(),
                });
            }
        }
    }

    for group in &mut groups {
        for measure in measures {
            let value = aggregate_measure(&group.items, measure);
            group.aggregates.insert(measure.agg_key(), value);
        }
    }

    log::debug!(
        "grouped {} rows into {} groups over {} key fields",
        rows.len(),
        groups.len(),
        config.key_fields().count()
    );
    groups
}

/// Unique members in first-seen order.
pub fn unique_members(keys: impl IntoIterator<Item = GroupKey>) -> Vec<GroupKey> {
    let mut seen: rustc_hash::FxHashSet<GroupKey> = rustc_hash::FxHashSet::default();
    let mut out = Vec::new();
    for key in keys {
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AggregationType;
    use table_model::{row, Value};

    fn sales() -> Vec<Row> {
        vec![
            row! { "country" => "US", "product" => "A", "sales" => 10.0 },
            row! { "country" => "US", "product" => "B", "sales" => 20.0 },
            row! { "country" => "CA", "product" => "A", "sales" => 5.0 },
            row! { "country" => "US", "product" => "A", "sales" => 7.0 },
        ]
    }

    #[test]
    fn groups_in_first_seen_order_with_aggregates() {
        let config = GroupConfig::new(vec!["country".into()], vec![]);
        let measures = [MeasureConfig::new("sales", "Sum of Sales", AggregationType::Sum)];
        let groups = group_rows(&sales(), Some(&config), &measures);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::single("US"));
        assert_eq!(groups[0].items.len(), 3);
        assert_eq!(groups[0].aggregate("sum_sales"), Some(37.0));
        assert_eq!(groups[1].aggregate("sum_sales"), Some(5.0));
    }

    #[test]
    fn composite_keys_list_rows_then_columns() {
        let config = GroupConfig::new(vec!["country".into()], vec!["product".into()]);
        let groups = group_rows(&sales(), Some(&config), &[]);
        let labels: Vec<String> = groups.iter().map(|g| g.key.label()).collect();
        assert_eq!(labels, vec!["US - A", "US - B", "CA - A"]);
        let (row, col) = groups[1].split_key(1);
        assert_eq!(row, GroupKey::single("US"));
        assert_eq!(col, GroupKey::single("B"));
        assert_eq!(GroupKey::join(&row, &col), groups[1].key);
    }

    #[test]
    fn missing_values_use_placeholder() {
        let rows = vec![
            row! { "country" => "US" },
            row! { "country" => Value::Null },
            row! { "other" => 1.0 },
        ];
        let config =
            GroupConfig::new(vec!["country".into()], vec![]).with_missing_placeholder("(none)");
        let groups = group_rows(&rows, Some(&config), &[]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].key, GroupKey::single("(none)"));
        assert_eq!(groups[1].items.len(), 2);
    }

    #[test]
    fn numeric_and_text_keys_stay_distinct() {
        let rows = vec![row! { "k" => 1.0 }, row! { "k" => "1" }];
        let config = GroupConfig::new(vec!["k".into()], vec![]);
        assert_eq!(group_rows(&rows, Some(&config), &[]).len(), 2);
    }

    #[test]
    fn no_config_means_no_groups() {
        assert!(group_rows(&sales(), None, &[]).is_empty());
    }
}
