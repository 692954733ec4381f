//! FILENAME: tests/test_import.rs
//! End-to-end imports: bytes in, rows and a layout out, applied to an engine.

use pivot_connect::{
    ConnectService, ImportFormat, ImportOptions, ImportResult, ProcessingTier,
};
use pivot_engine::{AggregationType, PivotEngine, PivotTableConfig, ALL_FIELD};
use table_model::{Row, Value};

const SALES_CSV: &str = "region,product,sales\n\
East,Apples,\"$1,200.50\"\n\
East,Pears,300\n\
West,Apples,250\n\
West,Pears,$50\n\
North,Apples,75\n";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn import_with(bytes: &[u8], format: ImportFormat, options: &ImportOptions) -> ImportResult {
    init_logging();
    ConnectService::import(bytes, format, options, |_| {})
}

fn forced(tier: ProcessingTier, chunk_size: usize) -> ImportOptions {
    ImportOptions {
        tier: Some(tier),
        chunk_size,
        ..ImportOptions::default()
    }
}

fn strip_all(rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .map(|r| {
            r.fields()
                .filter(|(name, _)| *name != ALL_FIELD)
                .map(|(name, value)| (name, value.clone()))
                .collect()
        })
        .collect()
}

#[test]
fn test_csv_import_builds_layout() {
    let result = import_with(SALES_CSV.as_bytes(), ImportFormat::Csv, &ImportOptions::default());
    assert!(result.success, "{:?}", result.error);
    let dataset = result.dataset.unwrap();

    assert_eq!(dataset.tier, ProcessingTier::Standard);
    assert_eq!(dataset.record_count, 5);
    assert!(!dataset.truncated);

    assert_eq!(dataset.layout.rows[0].unique_name, "region");
    assert_eq!(dataset.layout.columns[0].unique_name, "product");
    let measure = &dataset.layout.measures[0];
    assert_eq!(measure.unique_name, "sales");
    assert_eq!(measure.aggregation, AggregationType::Sum);
    assert_eq!(measure.format.as_ref().and_then(|f| f.currency.as_deref()), Some("USD"));

    assert_eq!(dataset.rows[0].value("sales"), &Value::Number(1200.5));
    assert_eq!(dataset.rows[3].value("sales"), &Value::Number(50.0));
}

#[test]
fn test_progress_is_monotone_and_ends_at_100() {
    for options in [
        ImportOptions::default(),
        forced(ProcessingTier::Workers, 16),
        forced(ProcessingTier::Streaming, 16),
    ] {
        let mut seen = Vec::new();
        let result = ConnectService::import(SALES_CSV.as_bytes(), ImportFormat::Csv, &options, |p| {
            seen.push(p)
        });
        assert!(result.success);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
    }
}

#[test]
fn test_all_tiers_agree() {
    let single = import_with(SALES_CSV.as_bytes(), ImportFormat::Csv, &ImportOptions::default());
    for tier in [ProcessingTier::Workers, ProcessingTier::Streaming] {
        for chunk_size in [1, 7, 32, 4096] {
            let chunked = import_with(SALES_CSV.as_bytes(), ImportFormat::Csv, &forced(tier, chunk_size));
            let (a, b) = (single.dataset.as_ref().unwrap(), chunked.dataset.as_ref().unwrap());
            assert_eq!(a.rows, b.rows, "{} tier, chunk size {}", tier, chunk_size);
            assert_eq!(a.layout, b.layout);
        }
    }
}

#[test]
fn test_quoted_newline_survives_chunking() {
    let csv = "name,note,amount\nA,\"first line\nsecond line\",1\nB,plain,2\nA,\"x, y\",3\n";
    for chunk_size in 1..csv.len() {
        let result = import_with(csv.as_bytes(), ImportFormat::Csv, &forced(ProcessingTier::Streaming, chunk_size));
        let rows = strip_all(&result.dataset.unwrap().rows);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value("note"), &Value::text("first line\nsecond line"));
        assert_eq!(rows[2].value("note"), &Value::text("x, y"));
    }
}

#[test]
fn test_literal_quotes_in_unquoted_fields_survive_chunking() {
    let csv = "part,size,qty\nhose,5\" pipe,2\nvalve,3\" pipe,4\nclamp,plain,1\n";
    let single = import_with(csv.as_bytes(), ImportFormat::Csv, &ImportOptions::default());
    let expected = strip_all(&single.dataset.unwrap().rows);
    assert_eq!(expected.len(), 3);
    assert_eq!(expected[0].value("size"), &Value::text("5\" pipe"));

    for tier in [ProcessingTier::Workers, ProcessingTier::Streaming] {
        for chunk_size in 1..csv.len() {
            let result =
                import_with(csv.as_bytes(), ImportFormat::Csv, &forced(tier, chunk_size));
            let rows = strip_all(&result.dataset.unwrap().rows);
            assert_eq!(rows, expected, "{} tier, chunk size {}", tier, chunk_size);
        }
    }
}

#[test]
fn test_record_cap_truncates() {
    let options = ImportOptions {
        max_records: Some(2),
        ..ImportOptions::default()
    };
    let dataset = import_with(SALES_CSV.as_bytes(), ImportFormat::Csv, &options)
        .dataset
        .unwrap();
    assert!(dataset.truncated);
    assert_eq!(dataset.record_count, 5);
    assert_eq!(dataset.rows.len(), 2);
}

#[test]
fn test_json_import() {
    let json = br#"{"data": [
        {"country": "US", "cat": "X", "price": 10},
        {"country": "US", "cat": "Y", "price": 20},
        {"country": "FR", "cat": "X", "price": 5, "extra": {"a": 1}}
    ]}"#;
    let result = import_with(json, ImportFormat::Json, &ImportOptions::default());
    assert!(result.success, "{:?}", result.error);
    let dataset = result.dataset.unwrap();
    assert_eq!(dataset.record_count, 3);
    assert_eq!(dataset.layout.measures.len(), 1);
    assert_eq!(dataset.layout.measures[0].unique_name, "price");
    assert_eq!(dataset.rows[2].value("extra"), &Value::text(r#"{"a":1}"#));
}

#[test]
fn test_malformed_json_reports_failure() {
    let result = import_with(b"[{\"a\": 1", ImportFormat::Json, &ImportOptions::default());
    assert!(!result.success);
    assert!(result.dataset.is_none());
    assert!(result.error.unwrap().starts_with("JSON parse error"));
}

#[test]
fn test_json_of_wrong_shape_reports_failure() {
    let result = import_with(br#"{"rows": [1, 2]}"#, ImportFormat::Json, &ImportOptions::default());
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Invalid data shape"));
}

#[test]
fn test_invalid_utf8_reports_line() {
    let mut bytes = b"a,b\nx,1\ny,".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe]);
    bytes.extend_from_slice(b"\n");
    for options in [ImportOptions::default(), forced(ProcessingTier::Workers, 4)] {
        let result = import_with(&bytes, ImportFormat::Csv, &options);
        assert!(!result.success);
        let error = result.error.unwrap_or_default();
        assert!(error.starts_with("CSV parse error at line 3"), "{}", error);
    }
}

#[test]
fn test_header_only_csv_imports_no_rows() {
    let result = import_with(b"region,sales\n", ImportFormat::Csv, &ImportOptions::default());
    assert!(result.success);
    let dataset = result.dataset.unwrap();
    assert!(dataset.rows.is_empty());
    assert!(dataset.layout.measures.is_empty());
}

#[test]
fn test_apply_loads_engine() {
    let dataset = import_with(SALES_CSV.as_bytes(), ImportFormat::Csv, &ImportOptions::default())
        .dataset
        .unwrap();
    let mut engine = PivotEngine::new(PivotTableConfig::new(Vec::new()));
    ConnectService::apply(&mut engine, dataset).unwrap();

    let state = engine.state();
    assert_eq!(state.raw_data.len(), 5);
    assert_eq!(state.rows[0].unique_name, "region");
    assert_eq!(state.processed_data.totals.get("sum_sales"), Some(&1875.5));

    let mut regions: Vec<String> = engine.row_members().iter().map(|m| m.label()).collect();
    regions.sort();
    assert_eq!(regions, vec!["East", "North", "West"]);
    assert_eq!(engine.column_members().len(), 2);
}
