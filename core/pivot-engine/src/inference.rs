//! FILENAME: core/pivot-engine/src/inference.rs
//! PURPOSE: Field type inference for datasets of unknown shape.
//! CONTEXT: Imported values often arrive as text. A field is classified by a
//! majority vote over a sample of its values, where currency-formatted text
//! ("$1,234.50", "(€12,5)") counts as numeric.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use table_model::{currency_code_for_symbol, Row, Value};

/// Rows inspected when inferring field types.
pub const TYPE_SAMPLE_SIZE: usize = 200;

/// Inferred type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    #[default]
    String,
    Date,
    Boolean,
    Null,
}

/// Classifies a single value.
pub fn classify_value(value: &Value) -> FieldType {
    match value {
        Value::Null => FieldType::Null,
        Value::Number(_) => FieldType::Number,
        Value::Boolean(_) => FieldType::Boolean,
        Value::Date(_) => FieldType::Date,
        Value::Text(text) => classify_text(text),
    }
}

fn classify_text(text: &str) -> FieldType {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        FieldType::Null
    } else if parse_currency_to_number(trimmed).is_some() {
        FieldType::Number
    } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        FieldType::Boolean
    } else if parse_date_text(trimmed).is_some() {
        FieldType::Date
    } else {
        FieldType::String
    }
}

/// Majority vote over the sampled values, nulls and blanks included. Ties
/// resolve in the order Number, Date, Boolean, String, Null; an empty sample
/// is `Null`.
pub fn infer_field_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> FieldType {
    const CANDIDATES: [FieldType; 5] = [
        FieldType::Number,
        FieldType::Date,
        FieldType::Boolean,
        FieldType::String,
        FieldType::Null,
    ];
    let mut votes = [0usize; 5];
    for value in values {
        let kind = classify_value(value);
        if let Some(slot) = CANDIDATES.iter().position(|c| *c == kind) {
            votes[slot] += 1;
        }
    }

    let mut winner = FieldType::Null;
    let mut best = 0;
    for (kind, count) in CANDIDATES.iter().zip(votes) {
        if count > best {
            best = count;
            winner = *kind;
        }
    }
    winner
}

/// Field names in first-seen order across the rows.
pub fn collect_field_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for name in row.field_names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Infers the type of `field` from the first [`TYPE_SAMPLE_SIZE`] rows.
pub fn infer_sampled_type(rows: &[Row], field: &str) -> FieldType {
    let sample = &rows[..rows.len().min(TYPE_SAMPLE_SIZE)];
    infer_field_type(sample.iter().map(|row| row.value(field)))
}

/// Returns the first currency symbol found in the text, if any.
pub fn detect_currency_symbol(text: &str) -> Option<char> {
    text.chars().find(|c| currency_code_for_symbol(*c).is_some())
}

// ============================================================================
// CURRENCY-AWARE NUMBER PARSING
// ============================================================================

/// Parses numeric and currency-formatted text.
///
/// Strips currency symbols and whitespace, reads `(…)` as negative, and
/// resolves separators: with both `.` and `,` the rightmost is the decimal
/// separator; with only `,` a single comma followed by 2 or 3 digits is a
/// decimal comma, otherwise commas group thousands. Returns `None` when the
/// text is not confidently numeric.
pub fn parse_currency_to_number(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    let (inner, parenthesized) = if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        (&s[1..s.len() - 1], true)
    } else {
        (s, false)
    };

    let mut cleaned = String::with_capacity(inner.len());
    for c in inner.chars() {
        if c.is_whitespace() || c == '\u{FEFF}' || currency_code_for_symbol(c).is_some() {
            continue;
        }
        cleaned.push(c);
    }

    let (digits, negative) = match cleaned.strip_prefix('-') {
        Some(rest) => (rest, !parenthesized),
        None => (cleaned.strip_prefix('+').unwrap_or(cleaned.as_str()), parenthesized),
    };
    if !digits.chars().any(|c| c.is_ascii_digit())
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    let normalized = normalize_separators(digits);
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn normalize_separators(digits: &str) -> String {
    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');
    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if dot > comma => digits.replace(',', ""),
        (Some(_), Some(_)) => digits.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let trailing = digits.len() - comma - 1;
            let commas = digits.matches(',').count();
            if commas == 1 && (2..=3).contains(&trailing) {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        (Some(_), None) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits.to_string(),
    }
}

// ============================================================================
// DATE TEXT
// ============================================================================

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses ISO, US and dotted European date text.
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
