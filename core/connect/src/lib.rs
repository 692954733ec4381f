//! FILENAME: core/connect/src/lib.rs
//! PURPOSE: File import for the pivot engine.
//! CONTEXT: Reads CSV or JSON bytes into `table_model::Row`s, choosing a
//! processing tier from the input size, then asks `pivot-engine` for an
//! automatic layout. The result can be applied straight to a `PivotEngine`.

pub mod chunk;
pub mod error;
pub mod import;
pub mod parse;
pub mod pool;
pub mod tier;

pub use chunk::{Chunk, ChunkReader, DEFAULT_CHUNK_SIZE};
pub use error::ConnectError;
pub use import::{ConnectService, ImportFormat, ImportOptions, ImportResult, ImportedDataset};
pub use parse::{normalize_cell, parse_csv_records, parse_json, read_header, CsvHeader};
pub use tier::{max_records_for, ProcessingTier};
