//! FILENAME: core/pivot-engine/src/sort.rs
//! Row and axis-member ordering.

use std::cmp::Ordering;

use table_model::{Row, Value};

use crate::definition::{SortConfig, SortDirection};

/// Applies a direction to a natural ordering.
pub fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Returns the rows ordered by the sort field. Numbers compare numerically,
/// text lexicographically. The sort is stable, and the input is returned
/// unchanged when no row carries the field.
pub fn sort_rows(rows: &[Row], config: &SortConfig) -> Vec<Row> {
    if !rows.iter().any(|row| row.contains(&config.field)) {
        return rows.to_vec();
    }
    sort_rows_by_key(rows, |row| row.value(&config.field).clone(), config.direction)
}

/// Stable sort of rows by a derived key.
pub fn sort_rows_by_key<F>(rows: &[Row], key: F, direction: SortDirection) -> Vec<Row>
where
    F: Fn(&Row) -> Value,
{
    let mut keyed: Vec<(Value, &Row)> = rows.iter().map(|row| (key(row), row)).collect();
    keyed.sort_by(|(a, _), (b, _)| directed(a.compare(b), direction));
    keyed.into_iter().map(|(_, row)| row.clone()).collect()
}

/// Stable sort of items by a precomputed number.
pub fn sort_by_number<T>(items: &mut [(T, f64)], direction: SortDirection) {
    items.sort_by(|(_, a), (_, b)| {
        directed(a.partial_cmp(b).unwrap_or(Ordering::Equal), direction)
    });
}
