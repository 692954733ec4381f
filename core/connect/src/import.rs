//! FILENAME: core/connect/src/import.rs
//! PURPOSE: Turns an uploaded file into rows plus a suggested pivot layout.
//! CONTEXT: `ConnectService::import` never fails outright; problems are
//! reported through `ImportResult { success: false, error }` so a UI can
//! show them. `ConnectService::apply` loads a finished import into an engine.

use pivot_engine::{build_auto_layout, Layout, PivotEngine, PivotError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use table_model::Row;

use crate::chunk::{Chunk, ChunkReader, DEFAULT_CHUNK_SIZE};
use crate::error::ConnectError;
use crate::parse::{parse_csv_records, parse_json, read_header};
use crate::pool::worker_pool;
use crate::tier::{estimate_records, max_records_for, ProcessingTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    /// Picks a format from a file name's extension.
    pub fn from_file_name(name: &str) -> Result<Self, ConnectError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(ImportFormat::Csv),
            "json" => Ok(ImportFormat::Json),
            _ => Err(ConnectError::UnsupportedFormat(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Bytes read per chunk in the chunked tiers.
    pub chunk_size: usize,
    /// Overrides the size-based record cap.
    pub max_records: Option<usize>,
    /// Forces a processing tier instead of choosing one from the input size.
    pub tier: Option<ProcessingTier>,
    pub delimiter: u8,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_records: None,
            tier: None,
            delimiter: b',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedDataset {
    /// Imported rows, as prepared by the auto layout (currency columns
    /// normalized, `__all__` added where the layout needs it).
    pub rows: Vec<Row>,
    pub layout: Layout,
    pub tier: ProcessingTier,
    /// Records parsed before the cap was applied.
    pub record_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub dataset: Option<ImportedDataset>,
    pub error: Option<String>,
}

impl ImportResult {
    fn ok(dataset: ImportedDataset) -> Self {
        ImportResult {
            success: true,
            dataset: Some(dataset),
            error: None,
        }
    }

    fn failed(err: &ConnectError) -> Self {
        ImportResult {
            success: false,
            dataset: None,
            error: Some(err.to_string()),
        }
    }
}

/// Forwards progress to the caller, dropping anything that would move
/// backwards.
struct Progress<'a> {
    callback: &'a mut dyn FnMut(u8),
    last: Option<u8>,
}

impl<'a> Progress<'a> {
    fn new(callback: &'a mut dyn FnMut(u8)) -> Self {
        Progress {
            callback,
            last: None,
        }
    }

    fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        (self.callback)(percent);
    }

    /// Maps `done / total` onto the `from..=to` band.
    fn report_fraction(&mut self, done: u64, total: u64, from: u8, to: u8) {
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).min(1.0)
        };
        let span = f64::from(to.saturating_sub(from));
        self.report(from + (fraction * span) as u8);
    }
}

// Progress bands.
const PARSE_START: u8 = 5;
const PARSE_END: u8 = 85;
const LAYOUT_START: u8 = 90;

pub struct ConnectService;

impl ConnectService {
    /// Parses `bytes` and proposes a layout. `progress` receives
    /// percentages that never decrease; a successful import ends at 100.
    pub fn import(
        bytes: &[u8],
        format: ImportFormat,
        options: &ImportOptions,
        mut progress: impl FnMut(u8),
    ) -> ImportResult {
        let mut progress = Progress::new(&mut progress);
        progress.report(0);
        match Self::run(bytes, format, options, &mut progress) {
            Ok(dataset) => {
                progress.report(100);
                ImportResult::ok(dataset)
            }
            Err(err) => {
                log::warn!("import failed: {}", err);
                ImportResult::failed(&err)
            }
        }
    }

    /// Replaces the engine's data with the import and applies its layout.
    pub fn apply(engine: &mut PivotEngine, dataset: ImportedDataset) -> Result<(), PivotError> {
        let Layout {
            rows,
            columns,
            measures,
        } = dataset.layout;
        engine.update_data_source(dataset.rows)?;
        engine.set_layout(rows, columns, measures)
    }

    fn run(
        bytes: &[u8],
        format: ImportFormat,
        options: &ImportOptions,
        progress: &mut Progress<'_>,
    ) -> Result<ImportedDataset, ConnectError> {
        if is_blank(bytes) {
            return Err(ConnectError::EmptyInput);
        }

        let tier = options
            .tier
            .unwrap_or_else(|| ProcessingTier::for_size(bytes.len()));
        log::info!(
            "importing {} bytes (~{} records) as {:?} via {} tier",
            bytes.len(),
            estimate_records(bytes),
            format,
            tier
        );

        let mut rows = match format {
            ImportFormat::Csv => match tier {
                ProcessingTier::Standard => parse_csv_single(bytes, options, progress)?,
                ProcessingTier::Workers => parse_csv_parallel(bytes, options, progress)?,
                ProcessingTier::Streaming => parse_csv_streaming(bytes, options, progress)?,
            },
            ImportFormat::Json => {
                progress.report(PARSE_START);
                parse_json(bytes)?
            }
        };
        progress.report(PARSE_END);

        let record_count = rows.len();
        let cap = options
            .max_records
            .unwrap_or_else(|| max_records_for(bytes.len()));
        let truncated = record_count > cap;
        if truncated {
            log::warn!(
                "keeping the first {} of {} records",
                cap,
                record_count
            );
            rows.truncate(cap);
        }

        progress.report(LAYOUT_START);
        let layout = build_auto_layout(&rows);
        Ok(ImportedDataset {
            rows: layout.data,
            layout: Layout {
                rows: layout.rows,
                columns: layout.columns,
                measures: layout.measures,
            },
            tier,
            record_count,
            truncated,
        })
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn parse_csv_single(
    bytes: &[u8],
    options: &ImportOptions,
    progress: &mut Progress<'_>,
) -> Result<Vec<Row>, ConnectError> {
    progress.report(PARSE_START);
    let header = read_header(bytes, options.delimiter)?;
    parse_csv_records(
        &bytes[header.body_offset..],
        &header.names,
        header.body_line,
        options.delimiter,
    )
}

/// Splits the input into chunks and parses them on the worker pool. The
/// header comes from the first chunk; row order follows chunk order.
fn parse_csv_parallel(
    bytes: &[u8],
    options: &ImportOptions,
    progress: &mut Progress<'_>,
) -> Result<Vec<Row>, ConnectError> {
    let chunks = ChunkReader::new(bytes, options.chunk_size)
        .with_delimiter(options.delimiter)
        .collect::<Result<Vec<_>, _>>()?;
    progress.report(PARSE_START + 10);

    let start = chunks
        .iter()
        .position(|c| !is_blank(&c.data))
        .ok_or(ConnectError::EmptyInput)?;
    let (first, rest) = (&chunks[start], &chunks[start + 1..]);
    let header = read_header(&first.data, options.delimiter)?;
    let mut rows = parse_csv_records(
        &first.data[header.body_offset..],
        &header.names,
        first.first_line + header.body_line - 1,
        options.delimiter,
    )?;

    let parse = |chunk: &Chunk| {
        parse_csv_records(&chunk.data, &header.names, chunk.first_line, options.delimiter)
    };
    let parsed: Vec<Vec<Row>> = match worker_pool() {
        Some(pool) => pool.install(|| rest.par_iter().map(parse).collect::<Result<_, _>>())?,
        None => {
            log::warn!("no worker pool available, parsing on the current thread");
            rest.iter().map(parse).collect::<Result<_, _>>()?
        }
    };
    rows.extend(parsed.into_iter().flatten());
    Ok(rows)
}

/// Parses one chunk at a time as it is read.
fn parse_csv_streaming(
    bytes: &[u8],
    options: &ImportOptions,
    progress: &mut Progress<'_>,
) -> Result<Vec<Row>, ConnectError> {
    let total = bytes.len() as u64;
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for chunk in ChunkReader::new(bytes, options.chunk_size).with_delimiter(options.delimiter) {
        let chunk = chunk?;
        if header.is_none() && is_blank(&chunk.data) {
            continue;
        }
        if let Some(names) = &header {
            rows.extend(parse_csv_records(
                &chunk.data,
                names,
                chunk.first_line,
                options.delimiter,
            )?);
        } else {
            let parsed = read_header(&chunk.data, options.delimiter)?;
            rows.extend(parse_csv_records(
                &chunk.data[parsed.body_offset..],
                &parsed.names,
                chunk.first_line + parsed.body_line - 1,
                options.delimiter,
            )?);
            header = Some(parsed.names);
        }
        progress.report_fraction(chunk.bytes_read, total, PARSE_START, PARSE_END);
    }

    if header.is_none() {
        return Err(ConnectError::EmptyInput);
    }
    Ok(rows)
}
