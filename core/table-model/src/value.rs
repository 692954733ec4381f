//! FILENAME: core/table-model/src/value.rs
//! PURPOSE: Defines the value held by a single field of a record.
//! CONTEXT: `Value` is what rows carry around (and what the UI displays).
//! `KeyValue` is its normalized, hashable twin used when values become part
//! of a group key. Keeping the two apart mirrors the cell value / cache value
//! split: rows stay cheap to build while grouping gets `Eq + Hash`.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// The value stored in one field of a record.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    Boolean(bool),
    Date(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the numeric reading of this value, if it has one.
    /// Text counts only when it is a plain decimal literal ("12", "-3.5").
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_plain_number(s),
            _ => None,
        }
    }

    /// Coerces the value to a number; anything non-numeric reads as 0.
    pub fn as_number(&self) -> f64 {
        self.numeric().unwrap_or(0.0)
    }

    /// Returns the display value as a String.
    pub fn display_value(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_plain_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => {
                if d.time() == chrono::NaiveTime::MIN {
                    d.format("%Y-%m-%d").to_string()
                } else {
                    d.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    /// Equality used by filters: numeric when both sides read as numbers,
    /// otherwise by display string.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a == b,
            _ => self.display_value() == other.display_value(),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Text(_) => 2,
            Value::Boolean(_) => 3,
            Value::Date(_) => 4,
        }
    }

    /// Natural ordering: numbers numerically, text lexicographically,
    /// mixed kinds by kind (null first).
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

/// Parses a plain decimal literal. Rejects empty strings and non-finite results.
pub fn parse_plain_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Largest magnitude below which every integer is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

// Whole numbers go out as integers so `1` survives a JSON round trip as `1`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(d) => d.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

fn format_plain_number(n: f64) -> String {
    // Format without unnecessary decimal places
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// HASHABLE KEY VALUES
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            // All NaN values hash to the same thing
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            // 0.0 and -0.0 compare equal, so they must hash equal
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// A normalized, hashable representation of a field value.
/// Used as the components of group keys and axis members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Null,
    Number(OrderedFloat),
    Boolean(bool),
    Date(NaiveDateTime),
    Text(String),
}

impl From<&Value> for KeyValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyValue::Null,
            Value::Number(n) => KeyValue::Number(OrderedFloat(*n)),
            Value::Text(s) => KeyValue::Text(s.clone()),
            Value::Boolean(b) => KeyValue::Boolean(*b),
            Value::Date(d) => KeyValue::Date(*d),
        }
    }
}

impl From<Value> for KeyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => KeyValue::Text(s),
            other => KeyValue::from(&other),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl KeyValue {
    pub fn to_value(&self) -> Value {
        match self {
            KeyValue::Null => Value::Null,
            KeyValue::Number(n) => Value::Number(n.0),
            KeyValue::Text(s) => Value::Text(s.clone()),
            KeyValue::Boolean(b) => Value::Boolean(*b),
            KeyValue::Date(d) => Value::Date(*d),
        }
    }

    /// Display label for headers.
    pub fn label(&self) -> String {
        self.to_value().display_value()
    }

    pub fn compare(&self, other: &KeyValue) -> Ordering {
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => {
                a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal)
            }
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
            _ => self.to_value().compare(&other.to_value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    #[test]
    fn coerces_numeric_text_and_rejects_the_rest() {
        assert_eq!(Value::text(" 12.5 ").as_number(), 12.5);
        assert_eq!(Value::text("abc").as_number(), 0.0);
        assert_eq!(Value::Boolean(true).as_number(), 0.0);
        assert_eq!(Value::Null.as_number(), 0.0);
        assert_eq!(Value::text("NaN").numeric(), None);
    }

    #[test]
    fn compares_numbers_numerically_and_text_lexicographically() {
        assert_eq!(Value::from(9.0).compare(&Value::from(10.0)), Ordering::Less);
        assert_eq!(Value::from("9").compare(&Value::from("10")), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::from(1.0)), Ordering::Less);
    }

    #[test]
    fn whole_numbers_serialize_as_integers() {
        let values = vec![
            Value::from(1.0),
            Value::from(-3.0),
            Value::from(2.5),
            Value::Null,
            Value::from(true),
            Value::text("x"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1,-3,2.5,null,true,"x"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn loose_equality_bridges_numbers_and_numeric_text() {
        assert!(Value::from(5.0).loose_eq(&Value::text("5")));
        assert!(Value::text("US").loose_eq(&Value::text("US")));
        assert!(!Value::text("US").loose_eq(&Value::text("us")));
    }

    #[test]
    fn displays_dates_without_midnight_time() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(Value::Date(date).display_value(), "2024-03-01");
        assert_eq!(Value::from(3.0).display_value(), "3");
        assert_eq!(Value::from(2.5).display_value(), "2.5");
    }

    #[test]
    fn key_values_hash_nan_and_signed_zero_consistently() {
        let mut set = HashSet::new();
        set.insert(KeyValue::from(&Value::Number(f64::NAN)));
        set.insert(KeyValue::from(&Value::Number(f64::NAN)));
        set.insert(KeyValue::from(&Value::Number(0.0)));
        set.insert(KeyValue::from(&Value::Number(-0.0)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn values_serialize_as_plain_json() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::from(1.5),
            Value::from("x"),
            Value::from(true),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1.5,"x",true]"#);
    }
}
