//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - Owns the table state and keeps it derived.
//!
//! Every mutating call updates the inputs in `PivotTableState`, re-runs the
//! derivation pipeline and notifies subscribers before returning.
//!
//! Derivation:
//! 1. Split filters into row filters and aggregate filters
//! 2. Filter and row-sort the raw rows into `data`
//! 3. Group `data` by the axis fields and drop groups failing aggregate filters
//! 4. Collect row/column members and apply custom or measure-sort ordering
//! 5. Recompute pagination and build `processed_data` for the current page
//!
//! Invalid arguments (indices out of range, unknown fields) are absorbed as
//! no-ops: nothing changes and nobody is notified.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use table_model::{format_number, KeyValue, Row, Value};

use crate::cache::{group_rows, unique_members, Group, GroupKey};
use crate::definition::{
    AggregationType, AxisConfig, DataHandlingMode, Dimension, FilterConfig, GroupConfig,
    MeasureConfig, PivotTableConfig, SortConfig, SortDirection, DEFAULT_MISSING_PLACEHOLDER,
};
use crate::error::{PivotError, SubscriberError};
use crate::filter::{aggregate_matches, partition_filters, row_matches};
use crate::pagination::PaginationConfig;
use crate::sort::{sort_by_number, sort_rows, sort_rows_by_key};
use crate::state::{CustomOrder, OrderOrigin, PivotTableState, MIN_ROW_HEIGHT};
use crate::view::{compute_totals, raw_view, CrossTab};

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

/// Handle returned by [`PivotEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type SubscriberResult = Result<(), SubscriberError>;

type Subscriber = Box<dyn FnMut(&PivotTableState) -> SubscriberResult>;

/// What the active sort targets.
enum SortTarget<'a> {
    Measure(&'a MeasureConfig),
    Field,
    Unknown,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct PivotEngine {
    config: PivotTableConfig,
    state: PivotTableState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    row_fields: Vec<String>,
    column_fields: Vec<String>,
    row_members: Vec<GroupKey>,
    column_members: Vec<GroupKey>,
}

impl fmt::Debug for PivotEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PivotEngine")
            .field("rows", &self.state.raw_data.len())
            .field("mode", &self.state.data_handling_mode)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl PivotEngine {
    pub fn new(config: PivotTableConfig) -> Self {
        let state = PivotTableState::from_config(&config);
        let mut engine = PivotEngine {
            config,
            state,
            subscribers: Vec::new(),
            next_subscription: 0,
            row_fields: Vec::new(),
            column_fields: Vec::new(),
            row_members: Vec::new(),
            column_members: Vec::new(),
        };
        engine.refresh();
        engine
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> &PivotTableState {
        &self.state
    }

    /// Owned snapshot of the current state.
    pub fn get_state(&self) -> PivotTableState {
        self.state.clone()
    }

    /// Distinct values of a raw field, first-seen order.
    pub fn unique_values(&self, field: &str) -> Vec<Value> {
        unique_members(
            self.state
                .raw_data
                .iter()
                .map(|row| GroupKey::single(KeyValue::from(row.value(field)))),
        )
        .into_iter()
        .filter_map(|key| key.values.first().map(KeyValue::to_value))
        .collect()
    }

    /// Row-axis members in display order.
    pub fn row_members(&self) -> &[GroupKey] {
        &self.row_members
    }

    /// Column-axis members in display order.
    pub fn column_members(&self) -> &[GroupKey] {
        &self.column_members
    }

    /// Formats a value of the named measure using its configured format.
    pub fn format_measure_value(&self, measure: &str, value: f64) -> String {
        let format = self
            .state
            .formatting
            .get(measure)
            .cloned()
            .or_else(|| {
                self.state
                    .find_measure(measure)
                    .and_then(|m| m.format.clone())
            })
            .unwrap_or_default();
        format_number(value, &format)
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Registers a callback; it is invoked immediately with the current state
    /// and then after every mutation. A failing first call is returned and the
    /// callback is not registered.
    pub fn subscribe<F>(&mut self, mut callback: F) -> Result<SubscriptionId, PivotError>
    where
        F: FnMut(&PivotTableState) -> SubscriberResult + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        callback(&self.state).map_err(|source| PivotError::Subscriber { id, source })?;
        self.subscribers.push((id, Box::new(callback)));
        Ok(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self) -> Result<(), PivotError> {
        let mut first_error = None;
        for (id, subscriber) in self.subscribers.iter_mut() {
            if let Err(source) = subscriber(&self.state) {
                log::error!("subscriber {} failed: {}", id, source);
                if first_error.is_none() {
                    first_error = Some(PivotError::Subscriber { id: *id, source });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn commit(&mut self) -> Result<(), PivotError> {
        self.refresh();
        self.notify()
    }

    // ------------------------------------------------------------------------
    // Data and layout
    // ------------------------------------------------------------------------

    /// Replaces the source rows. Returns to page 1 and drops custom orders.
    pub fn update_data_source(&mut self, rows: Vec<Row>) -> Result<(), PivotError> {
        log::debug!("data source replaced with {} rows", rows.len());
        self.state.raw_data = rows;
        self.state.pagination_config.current_page = 1;
        self.state.custom_row_order = None;
        self.state.custom_column_order = None;
        self.commit()
    }

    pub fn set_layout(
        &mut self,
        rows: Vec<AxisConfig>,
        columns: Vec<AxisConfig>,
        measures: Vec<MeasureConfig>,
    ) -> Result<(), PivotError> {
        self.state.rows = rows;
        self.state.columns = columns;
        let measures = dedupe_measures(measures);
        self.register_formats(&measures);
        self.state.measures = measures.clone();
        self.state.selected_measures = measures;
        self.commit()
    }

    pub fn set_group_config(&mut self, config: Option<GroupConfig>) -> Result<(), PivotError> {
        self.state.group_config = config;
        self.commit()
    }

    /// Replaces the selected measures. A measure listed twice keeps its last
    /// configuration at its first position.
    pub fn set_measures(&mut self, measures: Vec<MeasureConfig>) -> Result<(), PivotError> {
        let measures = dedupe_measures(measures);
        for measure in &measures {
            match self
                .state
                .measures
                .iter_mut()
                .find(|m| m.unique_name == measure.unique_name)
            {
                Some(existing) => *existing = measure.clone(),
                None => self.state.measures.push(measure.clone()),
            }
        }
        self.register_formats(&measures);
        self.state.selected_measures = measures;
        self.commit()
    }

    pub fn set_dimensions(&mut self, dimensions: Vec<Dimension>) -> Result<(), PivotError> {
        self.state.dimensions = dimensions;
        self.commit()
    }

    /// Sets the aggregation of every selected measure.
    pub fn set_aggregation(&mut self, aggregation: AggregationType) -> Result<(), PivotError> {
        self.state.selected_aggregation = aggregation;
        for measure in &mut self.state.selected_measures {
            measure.aggregation = aggregation;
            if let Some(m) = self
                .state
                .measures
                .iter_mut()
                .find(|m| m.unique_name == measure.unique_name)
            {
                m.aggregation = aggregation;
            }
        }
        self.commit()
    }

    pub fn set_data_handling_mode(&mut self, mode: DataHandlingMode) -> Result<(), PivotError> {
        self.state.data_handling_mode = mode;
        self.commit()
    }

    /// Restores the construction-time configuration. Subscribers stay.
    pub fn reset(&mut self) -> Result<(), PivotError> {
        self.state = PivotTableState::from_config(&self.config);
        self.commit()
    }

    fn register_formats(&mut self, measures: &[MeasureConfig]) {
        for measure in measures {
            if let Some(format) = &measure.format {
                self.state
                    .formatting
                    .insert(measure.unique_name.clone(), format.clone());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Filtering, sorting, ordering
    // ------------------------------------------------------------------------

    /// Replaces the active filters (combined with AND) and returns to page 1.
    pub fn apply_filters(&mut self, filters: Vec<FilterConfig>) -> Result<(), PivotError> {
        self.state.filter_config = filters;
        self.state.pagination_config.current_page = 1;
        self.commit()
    }

    pub fn clear_filters(&mut self) -> Result<(), PivotError> {
        if self.state.filter_config.is_empty() {
            return Ok(());
        }
        self.apply_filters(Vec::new())
    }

    /// Sorts by a raw field, a measure or an aggregate key. Unknown fields are
    /// ignored. A new sort replaces any custom row order.
    pub fn sort(&mut self, field: &str, direction: SortDirection) -> Result<(), PivotError> {
        if matches!(self.sort_target(field), SortTarget::Unknown) {
            log::debug!("ignoring sort on unknown field '{}'", field);
            return Ok(());
        }
        self.state.sort_config.push(SortConfig::new(field, direction));
        self.state.custom_row_order = None;
        self.commit()
    }

    /// Orders a single-field axis by the given values; unlisted values follow
    /// in their natural order.
    pub fn set_custom_field_order(
        &mut self,
        field: &str,
        values: Vec<Value>,
        is_row: bool,
    ) -> Result<(), PivotError> {
        let members = values
            .into_iter()
            .map(|v| GroupKey::single(KeyValue::from(v)))
            .collect();
        let order = CustomOrder::manual(vec![field.to_string()], members);
        if is_row {
            self.state.custom_row_order = Some(order);
        } else {
            self.state.custom_column_order = Some(order);
        }
        self.commit()
    }

    pub fn swap_data_rows(&mut self, from: usize, to: usize) -> Result<(), PivotError> {
        let Some(members) = swapped(&self.row_members, from, to) else {
            return Ok(());
        };
        self.state.custom_row_order = Some(CustomOrder::manual(self.row_fields.clone(), members));
        self.commit()
    }

    pub fn swap_data_columns(&mut self, from: usize, to: usize) -> Result<(), PivotError> {
        let Some(members) = swapped(&self.column_members, from, to) else {
            return Ok(());
        };
        self.state.custom_column_order =
            Some(CustomOrder::manual(self.column_fields.clone(), members));
        self.commit()
    }

    /// Moves a raw row from one position to another (remove, then insert).
    pub fn drag_row(&mut self, from: usize, to: usize) -> Result<(), PivotError> {
        if !move_item(&mut self.state.raw_data, from, to) {
            return Ok(());
        }
        self.commit()
    }

    /// Moves a column-axis field from one position to another.
    pub fn drag_column(&mut self, from: usize, to: usize) -> Result<(), PivotError> {
        if !move_item(&mut self.state.columns, from, to) {
            return Ok(());
        }
        self.commit()
    }

    // ------------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------------

    pub fn set_pagination(&mut self, config: PaginationConfig) -> Result<(), PivotError> {
        let pagination = &mut self.state.pagination_config;
        pagination.page_size = config.page_size.max(1);
        pagination.current_page = config.current_page;
        self.commit()
    }

    /// Records a row height (at least 20). Indices past the displayed item
    /// count are ignored.
    pub fn resize_row(&mut self, index: usize, height: f64) -> Result<(), PivotError> {
        if index >= self.item_count() {
            return Ok(());
        }
        let height = if height.is_nan() {
            MIN_ROW_HEIGHT
        } else {
            height.max(MIN_ROW_HEIGHT)
        };
        self.state.row_sizes.insert(index, height);
        self.commit()
    }

    pub fn toggle_row_expansion(&mut self, row_id: &str) -> Result<(), PivotError> {
        if !self.state.expanded_rows.remove(row_id) {
            self.state.expanded_rows.insert(row_id.to_string());
        }
        self.commit()
    }

    // ------------------------------------------------------------------------
    // Derivation
    // ------------------------------------------------------------------------

    fn sort_target(&self, field: &str) -> SortTarget<'_> {
        if let Some(measure) = self.state.find_measure(field) {
            SortTarget::Measure(measure)
        } else if self.state.raw_data.iter().any(|row| row.contains(field)) {
            SortTarget::Field
        } else {
            SortTarget::Unknown
        }
    }

    fn item_count(&self) -> usize {
        match self.state.data_handling_mode {
            DataHandlingMode::Raw => self.state.data.len(),
            DataHandlingMode::Processed => self.row_members.len(),
        }
    }

    fn refresh(&mut self) {
        let mode = self.state.data_handling_mode;
        let active_sort = self.state.active_sort().cloned();

        // Filter and row-level sort.
        let plan = partition_filters(
            &self.state.filter_config,
            &self.state.selected_measures,
            &self.state.raw_data,
        );
        let mut data: Vec<Row> = self
            .state
            .raw_data
            .iter()
            .filter(|row| row_matches(row, &plan.row_filters))
            .cloned()
            .collect();

        let mut measure_sort: Option<(MeasureConfig, SortDirection)> = None;
        if let Some(sort) = &active_sort {
            match self.sort_target(&sort.field) {
                SortTarget::Measure(measure) if mode == DataHandlingMode::Processed => {
                    measure_sort = Some((measure.clone(), sort.direction));
                }
                SortTarget::Measure(measure) => {
                    data = sort_rows_by_key(
                        &data,
                        |row| Value::Number(measure.row_value(row)),
                        sort.direction,
                    );
                }
                SortTarget::Field => data = sort_rows(&data, sort),
                SortTarget::Unknown => {}
            }
        }

        // Grouping.
        let grouping = match mode {
            DataHandlingMode::Raw => self.state.group_config.clone(),
            DataHandlingMode::Processed => self.state.effective_group_config(),
        };
        let mut groups = group_rows(&data, grouping.as_ref(), &self.state.selected_measures);
        if mode == DataHandlingMode::Processed && !plan.aggregate_filters.is_empty() {
            groups.retain(|group| {
                plan.aggregate_filters
                    .iter()
                    .all(|f| aggregate_matches(group.aggregate(&f.field), f))
            });
        }

        // Raw mode groups only on an explicit config but still lists axis members.
        let axes = match mode {
            DataHandlingMode::Raw => self.state.effective_group_config(),
            DataHandlingMode::Processed => grouping.clone(),
        };
        let (row_fields, column_fields) = match &axes {
            Some(config) => (config.row_fields.clone(), config.column_fields.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let placeholder = axes
            .as_ref()
            .map(|g| g.missing_placeholder.clone())
            .unwrap_or_else(|| DEFAULT_MISSING_PLACEHOLDER.to_string());

        // Axis members.
        let (mut row_members, mut column_members) = match mode {
            DataHandlingMode::Processed => {
                let split = groups.iter().map(|g| g.split_key(row_fields.len()));
                let (rows, cols): (Vec<_>, Vec<_>) = split.unzip();
                (unique_members(rows), unique_members(cols))
            }
            DataHandlingMode::Raw => {
                let rows = data.iter().map(|r| {
                    GroupKey::from_row(r, row_fields.iter().map(String::as_str), &placeholder)
                });
                let cols = data.iter().map(|r| {
                    GroupKey::from_row(r, column_fields.iter().map(String::as_str), &placeholder)
                });
                (unique_members(rows), unique_members(cols))
            }
        };

        let manual_row_order = self
            .state
            .custom_row_order
            .as_ref()
            .filter(|o| o.origin == OrderOrigin::Manual && o.applies_to(&row_fields))
            .map(|o| o.members.clone());
        if let Some(order) = manual_row_order {
            row_members = apply_order(row_members, &order);
        } else if let Some((measure, direction)) = &measure_sort {
            row_members =
                order_by_measure(row_members, &groups, row_fields.len(), measure, *direction);
            self.state.custom_row_order = Some(CustomOrder {
                fields: row_fields.clone(),
                members: row_members.clone(),
                origin: OrderOrigin::Sort,
            });
        }
        if let Some(order) = &self.state.custom_column_order {
            if order.applies_to(&column_fields) {
                column_members = apply_order(column_members, &order.members);
            }
        }

        // Pagination and output.
        let item_count = match mode {
            DataHandlingMode::Raw => data.len(),
            DataHandlingMode::Processed => row_members.len(),
        };
        self.state.pagination_config.recompute(item_count);
        let page = self.state.pagination_config.page_range(item_count);

        self.state.processed_data = match mode {
            DataHandlingMode::Raw => {
                raw_view(&self.state.raw_data, &data, page, &self.state.selected_measures)
            }
            DataHandlingMode::Processed => {
                let totals = if grouping.is_some() {
                    compute_totals(
                        groups.iter().flat_map(|g| g.items.iter()),
                        &self.state.selected_measures,
                    )
                } else {
                    compute_totals(data.iter(), &self.state.selected_measures)
                };
                CrossTab {
                    row_captions: row_fields.iter().map(|f| self.state.axis_caption(f)).collect(),
                    row_field_count: row_fields.len(),
                    has_column_axis: !column_fields.is_empty(),
                    row_members: &row_members,
                    column_members: &column_members,
                    groups: &groups,
                    measures: &self.state.selected_measures,
                }
                .build(page, totals)
            }
        };

        log::debug!(
            "derived {:?} view: {} rows, {} groups, {} row members, {} column members",
            mode,
            data.len(),
            groups.len(),
            row_members.len(),
            column_members.len()
        );

        self.state.data = data;
        self.state.groups = groups;
        self.row_fields = row_fields;
        self.column_fields = column_fields;
        self.row_members = row_members;
        self.column_members = column_members;
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Keeps the last configuration of each unique name at its first position.
fn dedupe_measures(measures: Vec<MeasureConfig>) -> Vec<MeasureConfig> {
    let mut out: Vec<MeasureConfig> = Vec::with_capacity(measures.len());
    for measure in measures {
        match out.iter_mut().find(|m| m.unique_name == measure.unique_name) {
            Some(existing) => *existing = measure,
            None => out.push(measure),
        }
    }
    out
}

/// Listed members first (skipping those not present), then the rest in
/// natural order.
fn apply_order(members: Vec<GroupKey>, order: &[GroupKey]) -> Vec<GroupKey> {
    let present: FxHashSet<&GroupKey> = members.iter().collect();
    let mut placed: FxHashSet<GroupKey> = FxHashSet::default();
    let mut out = Vec::with_capacity(members.len());
    for member in order {
        if present.contains(member) && placed.insert(member.clone()) {
            out.push(member.clone());
        }
    }
    let mut rest: Vec<GroupKey> = members
        .iter()
        .filter(|m| !placed.contains(*m))
        .cloned()
        .collect();
    rest.sort_by(|a, b| a.compare(b));
    out.extend(rest);
    out
}

/// Orders row members by the measure's aggregate summed across all column
/// members of the row.
fn order_by_measure(
    members: Vec<GroupKey>,
    groups: &[Group],
    row_len: usize,
    measure: &MeasureConfig,
    direction: SortDirection,
) -> Vec<GroupKey> {
    let key = measure.agg_key();
    let mut totals: FxHashMap<GroupKey, f64> = FxHashMap::default();
    for group in groups {
        *totals.entry(group.row_key(row_len)).or_default() += group.aggregate(&key).unwrap_or(0.0);
    }
    let mut keyed: Vec<(GroupKey, f64)> = members
        .into_iter()
        .map(|m| {
            let total = totals.get(&m).copied().unwrap_or(0.0);
            (m, total)
        })
        .collect();
    sort_by_number(&mut keyed, direction);
    keyed.into_iter().map(|(m, _)| m).collect()
}

fn swapped(members: &[GroupKey], from: usize, to: usize) -> Option<Vec<GroupKey>> {
    if from == to || from >= members.len() || to >= members.len() {
        return None;
    }
    let mut out = members.to_vec();
    out.swap(from, to);
    Some(out)
}

fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from == to || from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_model::row;

    #[test]
    fn apply_order_puts_listed_members_first() {
        let members = vec![
            GroupKey::single("c"),
            GroupKey::single("a"),
            GroupKey::single("b"),
            GroupKey::single("d"),
        ];
        let order = vec![GroupKey::single("b"), GroupKey::single("zzz"), GroupKey::single("c")];
        let out = apply_order(members, &order);
        let labels: Vec<String> = out.iter().map(GroupKey::label).collect();
        assert_eq!(labels, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn move_item_uses_splice_semantics() {
        let mut items = vec!['A', 'B', 'C', 'D'];
        assert!(move_item(&mut items, 0, 3));
        assert_eq!(items, vec!['B', 'C', 'D', 'A']);
        assert!(!move_item(&mut items, 1, 1));
        assert!(!move_item(&mut items, 0, 4));
    }

    #[test]
    fn dedupe_keeps_first_position_last_config() {
        let out = dedupe_measures(vec![
            MeasureConfig::new("a", "A", AggregationType::Sum),
            MeasureConfig::new("b", "B", AggregationType::Sum),
            MeasureConfig::new("a", "A", AggregationType::Max),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].aggregation, AggregationType::Max);
    }

    #[test]
    fn sort_on_unknown_field_does_not_notify() {
        let config = PivotTableConfig::new(vec![row! { "a" => 1.0 }]);
        let mut engine = PivotEngine::new(config);
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = calls.clone();
        engine
            .subscribe(move |_| {
                seen.set(seen.get() + 1);
                Ok(())
            })
            .unwrap();
        engine.sort("missing", SortDirection::Asc).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(engine.state().sort_config.is_empty());
    }
}
