//! FILENAME: core/connect/src/parse.rs
//! PURPOSE: Decodes CSV and JSON bytes into rows.
//! CONTEXT: CSV is read header-first so that chunks after the first can be
//! parsed independently against the same field names. JSON accepts an
//! array of records or an object wrapping one in `data`.

use std::collections::HashSet;
use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use table_model::{parse_plain_number, Row, Value};

use crate::error::ConnectError;

// ============================================================================
// CSV
// ============================================================================

/// Field names read from the first CSV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvHeader {
    pub names: Vec<String>,
    /// Byte offset of the first data record.
    pub body_offset: usize,
    /// 1-based line number of the first data record.
    pub body_line: u64,
}

fn csv_reader(bytes: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes)
}

fn map_csv_error(err: csv::Error, first_line: u64) -> ConnectError {
    let reason = err.to_string();
    let line = err.position().map(|p| p.line()).filter(|l| *l > 0);
    match err.into_kind() {
        csv::ErrorKind::Io(e) => ConnectError::Io(e),
        _ => ConnectError::Csv {
            row: line.map(|l| first_line + l - 1).unwrap_or(first_line),
            reason,
        },
    }
}

/// Reads the header record at the start of `bytes`.
pub fn read_header(bytes: &[u8], delimiter: u8) -> Result<CsvHeader, ConnectError> {
    let mut reader = csv_reader(bytes, delimiter);
    let mut record = csv::StringRecord::new();
    if !reader
        .read_record(&mut record)
        .map_err(|e| map_csv_error(e, 1))?
    {
        return Err(ConnectError::EmptyInput);
    }
    let position = reader.position();
    Ok(CsvHeader {
        names: normalize_headers(record.iter()),
        body_offset: position.byte() as usize,
        body_line: position.line(),
    })
}

/// Trims header names and makes them usable as field names: blanks become
/// `column_N` and repeats get a numeric suffix.
pub fn normalize_headers<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (i, raw) in names.into_iter().enumerate() {
        let trimmed = raw.trim_start_matches('\u{feff}').trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", i + 1)
        } else {
            trimmed.to_string()
        };
        let mut name = base.clone();
        let mut n = 2;
        while !seen.insert(name.clone()) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        out.push(name);
    }
    out
}

/// Parses data records (no header) against `headers`. `first_line` is the
/// line of `bytes[0]` in the whole input and is used for error positions.
pub fn parse_csv_records(
    bytes: &[u8],
    headers: &[String],
    first_line: u64,
    delimiter: u8,
) -> Result<Vec<Row>, ConnectError> {
    let mut reader = csv_reader(bytes, delimiter);
    let mut record = csv::StringRecord::new();
    let mut rows = Vec::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {
                if let Some(row) = record_to_row(&record, headers) {
                    rows.push(row);
                }
            }
            Ok(false) => break,
            Err(err) => return Err(map_csv_error(err, first_line)),
        }
    }
    Ok(rows)
}

/// Fields past the header get positional names. Records with no content
/// are dropped.
fn record_to_row(record: &csv::StringRecord, headers: &[String]) -> Option<Row> {
    let mut row = Row::with_capacity(record.len());
    let mut has_content = false;
    for (i, field) in record.iter().enumerate() {
        let value = normalize_cell(field);
        has_content |= !value.is_null();
        match headers.get(i) {
            Some(name) => row.insert(name.as_str(), value),
            None => row.insert(format!("column_{}", i + 1), value),
        }
    }
    has_content.then_some(row)
}

/// Blank → Null, true/false → Boolean, plain decimal → Number, else Text.
pub fn normalize_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    match parse_plain_number(trimmed) {
        Some(n) => Value::Number(n),
        None => Value::Text(trimmed.to_string()),
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Records(Vec<JsonItem>),
    Wrapped { data: Vec<JsonItem> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonItem {
    Record(JsonRecord),
    Other(serde_json::Value),
}

/// A JSON object read in document order.
struct JsonRecord(Row);

struct JsonRecordVisitor;

impl<'de> Visitor<'de> for JsonRecordVisitor {
    type Value = JsonRecord;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<JsonRecord, A::Error> {
        let mut row = Row::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
            row.insert(name, json_to_value(value));
        }
        Ok(JsonRecord(row))
    }
}

impl<'de> Deserialize<'de> for JsonRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(JsonRecordVisitor)
    }
}

/// Scalars map onto values; nested arrays and objects are kept as their
/// JSON text.
pub fn json_to_value(value: serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        Json::String(s) => Value::Text(s),
        nested @ (Json::Array(_) | Json::Object(_)) => Value::Text(nested.to_string()),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Parses a JSON array of records, or `{"data": [...]}`.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<Row>, ConnectError> {
    let document: JsonDocument = serde_json::from_slice(bytes).map_err(|err| {
        if err.classify() == serde_json::error::Category::Data {
            ConnectError::InvalidShape(
                "expected an array of records or an object with a `data` array".to_string(),
            )
        } else {
            ConnectError::Json(err)
        }
    })?;

    let items = match document {
        JsonDocument::Records(items) | JsonDocument::Wrapped { data: items } => items,
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonItem::Record(JsonRecord(row)) => Ok(row),
            JsonItem::Other(other) => Err(ConnectError::InvalidShape(format!(
                "record {} is {}, expected an object",
                i + 1,
                json_kind(&other)
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_cell() {
        assert_eq!(normalize_cell(""), Value::Null);
        assert_eq!(normalize_cell("   "), Value::Null);
        assert_eq!(normalize_cell("TRUE"), Value::Boolean(true));
        assert_eq!(normalize_cell("false"), Value::Boolean(false));
        assert_eq!(normalize_cell(" 42 "), Value::Number(42.0));
        assert_eq!(normalize_cell("-3.5"), Value::Number(-3.5));
        assert_eq!(normalize_cell("$1,200"), Value::text("$1,200"));
        assert_eq!(normalize_cell("East"), Value::text("East"));
    }

    #[test]
    fn test_read_header_reports_body_position() {
        let input = b"region, sales\nEast,10\n";
        let header = read_header(input, b',').unwrap();
        assert_eq!(header.names, headers(&["region", "sales"]));
        assert_eq!(header.body_offset, 14);
        assert_eq!(header.body_line, 2);
        assert_eq!(&input[header.body_offset..], b"East,10\n");
    }

    #[test]
    fn test_read_header_on_empty_input() {
        assert!(matches!(read_header(b"", b','), Err(ConnectError::EmptyInput)));
    }

    #[test]
    fn test_normalize_headers() {
        let names = normalize_headers(["\u{feff}id", "", "name", "name", " name "]);
        assert_eq!(names, headers(&["id", "column_2", "name", "name_2", "name_3"]));
    }

    #[test]
    fn test_parse_records_handles_ragged_rows() {
        let rows = parse_csv_records(
            b"East,10\nWest\nNorth,5,extra\n,\n",
            &headers(&["region", "sales"]),
            2,
            b',',
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value("sales"), &Value::Number(10.0));
        assert!(!rows[1].contains("sales"));
        assert_eq!(rows[2].value("column_3"), &Value::text("extra"));
    }

    #[test]
    fn test_quoted_fields() {
        let rows = parse_csv_records(
            b"\"Smith, J\",\"said \"\"hi\"\"\nthere\"\n",
            &headers(&["name", "note"]),
            2,
            b',',
        )
        .unwrap();
        assert_eq!(rows[0].value("name"), &Value::text("Smith, J"));
        assert_eq!(rows[0].value("note"), &Value::text("said \"hi\"\nthere"));
    }

    #[test]
    fn test_invalid_utf8_reports_line() {
        let err = parse_csv_records(b"ok,1\nbad,\xff\xfe\n", &headers(&["a", "b"]), 10, b',')
            .unwrap_err();
        match err {
            ConnectError::Csv { row, .. } => assert_eq!(row, 11),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_json_array_keeps_field_order() {
        let rows = parse_json(br#"[{"zeta": 1, "alpha": "x", "tags": [1, 2], "ok": true}]"#).unwrap();
        let names: Vec<&str> = rows[0].field_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "tags", "ok"]);
        assert_eq!(rows[0].value("tags"), &Value::text("[1,2]"));
        assert_eq!(rows[0].value("ok"), &Value::Boolean(true));
    }

    #[test]
    fn test_parse_json_wrapped_data() {
        let rows = parse_json(br#"{"meta": {"v": 1}, "data": [{"a": 1}, {"a": null}]}"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].value("a").is_null());
    }

    #[test]
    fn test_parse_json_rejects_bad_shapes() {
        assert!(matches!(parse_json(b"42"), Err(ConnectError::InvalidShape(_))));
        assert!(matches!(parse_json(br#"{"rows": []}"#), Err(ConnectError::InvalidShape(_))));
        match parse_json(br#"[{"a": 1}, 7]"#) {
            Err(ConnectError::InvalidShape(msg)) => assert!(msg.contains("record 2")),
            other => panic!("unexpected result {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_parse_json_syntax_error() {
        assert!(matches!(parse_json(b"[{\"a\": 1,"), Err(ConnectError::Json(_))));
    }
}
