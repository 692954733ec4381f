//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot View - The renderable output.
//!
//! `ProcessedData` is the flat table handed to UI layers: one header row,
//! the cells of the current page and the grand totals per aggregate key.

use std::collections::BTreeMap;
use std::ops::Range;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use table_model::{Row, Value};

use crate::aggregate::aggregate_measure;
use crate::cache::{Group, GroupKey};
use crate::definition::MeasureConfig;
use crate::inference::collect_field_names;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Grand totals keyed by aggregate key.
    pub totals: BTreeMap<String, f64>,
}

/// Grand totals of every measure over `rows`.
pub fn compute_totals<'a, I>(rows: I, measures: &[MeasureConfig]) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a Row> + Clone,
{
    measures
        .iter()
        .map(|m| (m.agg_key(), aggregate_measure(rows.clone(), m)))
        .collect()
}

/// Raw mode: the filtered, sorted rows of the current page, one column per
/// field seen in the source rows.
pub fn raw_view(
    raw_data: &[Row],
    data: &[Row],
    page: Range<usize>,
    measures: &[MeasureConfig],
) -> ProcessedData {
    let headers = collect_field_names(raw_data);
    let rows = data[page]
        .iter()
        .map(|row| headers.iter().map(|h| row.value(h).clone()).collect())
        .collect();
    ProcessedData {
        headers,
        rows,
        totals: compute_totals(data.iter(), measures),
    }
}

/// Inputs of a processed (cross-tabulated) view.
pub struct CrossTab<'a> {
    pub row_captions: Vec<String>,
    pub row_field_count: usize,
    pub has_column_axis: bool,
    pub row_members: &'a [GroupKey],
    pub column_members: &'a [GroupKey],
    pub groups: &'a [Group],
    pub measures: &'a [MeasureConfig],
}

impl<'a> CrossTab<'a> {
    /// Header row: row captions, one column per (column member, measure),
    /// then one total column per measure when there is a column axis.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.row_captions.clone();
        for column in self.column_members {
            for measure in self.measures {
                if self.has_column_axis {
                    headers.push(format!("{} - {}", column.label(), measure.caption));
                } else {
                    headers.push(measure.caption.clone());
                }
            }
        }
        if self.has_column_axis {
            for measure in self.measures {
                headers.push(format!("Total - {}", measure.caption));
            }
        }
        headers
    }

    /// Builds the view for the row members in `page`. `totals` are computed
    /// by the caller because their row set depends on the mode.
    pub fn build(&self, page: Range<usize>, totals: BTreeMap<String, f64>) -> ProcessedData {
        let by_key: FxHashMap<&GroupKey, &Group> =
            self.groups.iter().map(|g| (&g.key, g)).collect();

        let mut by_row: FxHashMap<GroupKey, Vec<&Group>> = FxHashMap::default();
        for group in self.groups {
            by_row
                .entry(group.row_key(self.row_field_count))
                .or_default()
                .push(group);
        }

        let rows = self.row_members[page]
            .iter()
            .map(|member| {
                let mut cells: Vec<Value> = member.values.iter().map(|v| v.to_value()).collect();
                for column in self.column_members {
                    let group = by_key.get(&GroupKey::join(member, column));
                    for measure in self.measures {
                        let cell = group
                            .and_then(|g| g.aggregate(&measure.agg_key()))
                            .map_or(Value::Null, Value::Number);
                        cells.push(cell);
                    }
                }
                if self.has_column_axis {
                    let row_groups = by_row.get(member).map(Vec::as_slice).unwrap_or(&[]);
                    for measure in self.measures {
                        let items = row_groups.iter().flat_map(|g| g.items.iter());
                        cells.push(Value::Number(aggregate_measure(items, measure)));
                    }
                }
                cells
            })
            .collect();

        ProcessedData {
            headers: self.headers(),
            rows,
            totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::group_rows;
    use crate::definition::{AggregationType, GroupConfig};
    use table_model::row;

    #[test]
    fn raw_view_pages_rows_under_first_seen_headers() {
        let data = vec![
            row! { "a" => 1.0 },
            row! { "a" => 2.0, "b" => "x" },
            row! { "a" => 3.0 },
        ];
        let view = raw_view(&data, &data, 1..3, &[]);
        assert_eq!(view.headers, vec!["a", "b"]);
        assert_eq!(
            view.rows,
            vec![
                vec![Value::from(2.0), Value::from("x")],
                vec![Value::from(3.0), Value::Null]
            ]
        );
    }

    #[test]
    fn cross_tab_fills_missing_cells_with_null() {
        let data = vec![
            row! { "country" => "US", "cat" => "X", "price" => 10.0 },
            row! { "country" => "US", "cat" => "Y", "price" => 20.0 },
            row! { "country" => "FR", "cat" => "X", "price" => 5.0 },
        ];
        let measures = [MeasureConfig::new("price", "Sum of Price", AggregationType::Sum)];
        let config = GroupConfig::new(vec!["country".into()], vec!["cat".into()]);
        let groups = group_rows(&data, Some(&config), &measures);
        let row_members = vec![GroupKey::single("US"), GroupKey::single("FR")];
        let column_members = vec![GroupKey::single("X"), GroupKey::single("Y")];
        let tab = CrossTab {
            row_captions: vec!["Country".into()],
            row_field_count: 1,
            has_column_axis: true,
            row_members: &row_members,
            column_members: &column_members,
            groups: &groups,
            measures: &measures,
        };
        let view = tab.build(0..2, compute_totals(data.iter(), &measures));
        assert_eq!(
            view.headers,
            vec![
                "Country",
                "X - Sum of Price",
                "Y - Sum of Price",
                "Total - Sum of Price"
            ]
        );
        assert_eq!(
            view.rows[1],
            vec![Value::from("FR"), Value::from(5.0), Value::Null, Value::from(5.0)]
        );
        assert_eq!(view.totals.get("sum_price"), Some(&35.0));
    }
}
