//! FILENAME: core/table-model/src/lib.rs
//! PURPOSE: Shared record types for the pivot workspace.
//! CONTEXT: Re-exports the value, row and number-format types used by
//! `pivot-engine` and `pivot-connect`.

pub mod number_format;
pub mod row;
pub mod value;

// Re-export commonly used types at the crate root
pub use number_format::{
    currency_code_for_symbol, currency_symbol, format_number, FormatKind, MeasureFormat,
    CURRENCY_SYMBOLS,
};
pub use row::Row;
pub use value::{parse_plain_number, KeyValue, OrderedFloat, Value};
