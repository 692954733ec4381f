//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot Table engine.
//!
//! Turns schemaless records into a grouped, cross-tabulated, sorted,
//! filtered and paginated view. Depends on `table-model` only for shared
//! types (Value, Row, MeasureFormat).
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot table IS)
//! - `cache`: Grouped rows with pre-computed aggregates (HOW we compute)
//! - `view`: Renderable output for the frontend (WHAT we display)
//! - `engine`: Stateful orchestrator that keeps the view derived
//! - `field_service` / `auto_layout`: layout helpers for UIs and imports

pub mod aggregate;
pub mod auto_layout;
pub mod cache;
pub mod definition;
pub mod engine;
pub mod error;
pub mod field_service;
pub mod filter;
pub mod formula;
pub mod inference;
pub mod pagination;
pub mod sort;
pub mod state;
pub mod view;

pub use aggregate::{aggregate, aggregate_by_name, aggregate_measure, AggregateAccumulator};
pub use auto_layout::{build_auto_layout, estimate_cardinality, AutoLayout, ALL_FIELD, ALL_VALUE};
pub use cache::{group_rows, Group, GroupKey};
pub use definition::*;
pub use engine::{PivotEngine, SubscriberResult, SubscriptionId};
pub use error::{PivotError, SubscriberError};
pub use field_service::{FieldInfo, FieldSelection, Layout};
pub use formula::Formula;
pub use inference::{parse_currency_to_number, FieldType};
pub use pagination::PaginationConfig;
pub use sort::sort_rows;
pub use state::{CustomOrder, OrderOrigin, PivotTableState};
pub use view::ProcessedData;
