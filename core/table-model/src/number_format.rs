//! FILENAME: core/table-model/src/number_format.rs
//! PURPOSE: Number formatting for measure values.
//! CONTEXT: Converts aggregated numbers to display strings according to the
//! per-measure `MeasureFormat` descriptor (number, currency or percent, with
//! locale-dependent separators).

use serde::{Deserialize, Serialize};

/// How a measure's values are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatKind {
    #[default]
    Number,
    Currency,
    Percent,
}

/// Format descriptor attached to a measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureFormat {
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// ISO currency code (e.g. "USD"); only used by `FormatKind::Currency`.
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_decimals() -> u8 {
    2
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl Default for MeasureFormat {
    fn default() -> Self {
        MeasureFormat::number(2)
    }
}

impl MeasureFormat {
    pub fn number(decimals: u8) -> Self {
        MeasureFormat {
            kind: FormatKind::Number,
            decimals,
            locale: default_locale(),
            currency: None,
        }
    }

    pub fn currency(code: impl Into<String>, decimals: u8) -> Self {
        MeasureFormat {
            kind: FormatKind::Currency,
            decimals,
            locale: default_locale(),
            currency: Some(code.into()),
        }
    }

    pub fn percent(decimals: u8) -> Self {
        MeasureFormat {
            kind: FormatKind::Percent,
            decimals,
            locale: default_locale(),
            currency: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

/// Currency symbols recognized in imported text, with their ISO codes.
pub const CURRENCY_SYMBOLS: [(char, &str); 5] = [
    ('$', "USD"),
    ('€', "EUR"),
    ('£', "GBP"),
    ('¥', "JPY"),
    ('₹', "INR"),
];

/// Returns the ISO code for a currency symbol.
pub fn currency_code_for_symbol(symbol: char) -> Option<&'static str> {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, code)| *code)
}

/// Returns the display symbol for an ISO code (the code itself if unknown).
pub fn currency_symbol(code: &str) -> &str {
    match code.to_ascii_uppercase().as_str() {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "INR" => "₹",
        _ => code,
    }
}

/// Thousands and decimal separators for a locale tag.
fn separators(locale: &str) -> (char, char) {
    let language = locale.split(['-', '_']).next().unwrap_or("en");
    match language {
        "de" | "es" | "it" | "nl" | "pt" | "id" | "tr" => ('.', ','),
        "fr" | "ru" | "pl" | "cs" | "sv" | "fi" | "nb" => (' ', ','),
        _ => (',', '.'),
    }
}

/// Whether the currency symbol goes before the amount for a locale.
fn symbol_leads(locale: &str) -> bool {
    let language = locale.split(['-', '_']).next().unwrap_or("en");
    matches!(language, "en" | "ja" | "zh" | "hi" | "ko")
}

/// Format a number according to the specified measure format.
pub fn format_number(value: f64, format: &MeasureFormat) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let (thousands, decimal) = separators(&format.locale);
    match format.kind {
        FormatKind::Number => format_decimal(value, format.decimals, thousands, decimal),
        FormatKind::Currency => {
            let code = format.currency.as_deref().unwrap_or("USD");
            format_currency(value, format.decimals, currency_symbol(code), &format.locale)
        }
        FormatKind::Percent => {
            let body = format_decimal(value * 100.0, format.decimals, thousands, decimal);
            format!("{}%", body)
        }
    }
}

/// Format a number with specified decimal places and thousands separator.
fn format_decimal(value: f64, decimal_places: u8, thousands: char, decimal: char) -> String {
    let rounded = format!("{:.prec$}", value, prec = decimal_places as usize);
    add_thousands_separator(&rounded, thousands, decimal)
}

/// Add thousands separators to a numeric string rendered with '.' decimals.
fn add_thousands_separator(s: &str, thousands: char, decimal: char) -> String {
    let mut parts = s.splitn(2, '.');
    let integer_part = parts.next().unwrap_or("");
    let decimal_part = parts.next();

    let negative = integer_part.starts_with('-');
    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut result = String::new();
    let len = digits.len();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(thousands);
        }
        result.push(c);
    }

    if negative && digits.chars().any(|c| c != '0') {
        result.insert(0, '-');
    }

    if let Some(decimals) = decimal_part {
        result.push(decimal);
        result.push_str(decimals);
    }

    result
}

/// Format a number as currency; negatives are wrapped in parentheses.
fn format_currency(value: f64, decimal_places: u8, symbol: &str, locale: &str) -> String {
    let (thousands, decimal) = separators(locale);
    let formatted = format_decimal(value.abs(), decimal_places, thousands, decimal);

    let with_symbol = if symbol_leads(locale) {
        format!("{}{}", symbol, formatted)
    } else {
        format!("{} {}", formatted, symbol)
    };

    if value < 0.0 {
        format!("({})", with_symbol)
    } else {
        with_symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_with_grouping() {
        let fmt = MeasureFormat::number(2);
        assert_eq!(format_number(1234567.891, &fmt), "1,234,567.89");
        assert_eq!(format_number(-42.0, &fmt), "-42.00");
        assert_eq!(format_number(-0.001, &fmt), "0.00");
    }

    #[test]
    fn formats_currency_per_locale() {
        assert_eq!(format_number(1234.5, &MeasureFormat::currency("USD", 2)), "$1,234.50");
        assert_eq!(format_number(-10.0, &MeasureFormat::currency("USD", 2)), "($10.00)");
        let euro = MeasureFormat::currency("EUR", 2).with_locale("de-DE");
        assert_eq!(format_number(1234.5, &euro), "1.234,50 €");
    }

    #[test]
    fn formats_percent() {
        assert_eq!(format_number(0.256, &MeasureFormat::percent(1)), "25.6%");
    }

    #[test]
    fn maps_symbols_to_codes() {
        assert_eq!(currency_code_for_symbol('£'), Some("GBP"));
        assert_eq!(currency_code_for_symbol('x'), None);
        assert_eq!(currency_symbol("inr"), "₹");
        assert_eq!(currency_symbol("CHF"), "CHF");
    }

    #[test]
    fn deserializes_with_defaults() {
        let fmt: MeasureFormat = serde_json::from_str(r#"{"type":"currency","currency":"GBP"}"#).unwrap();
        assert_eq!(fmt.kind, FormatKind::Currency);
        assert_eq!(fmt.decimals, 2);
        assert_eq!(fmt.locale, "en-US");
    }
}
