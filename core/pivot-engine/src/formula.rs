//! FILENAME: core/pivot-engine/src/formula.rs
//! Calculated measures.
//!
//! A formula derives a per-row number from other fields of the same row.
//! The result is aggregated like any stored field; each variant is a small
//! closed expression so configs stay serializable.

use serde::{Deserialize, Serialize};
use table_model::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Formula {
    /// numerator / denominator; a zero denominator yields 0.
    Ratio { numerator: String, denominator: String },
    Product { left: String, right: String },
    Difference { left: String, right: String },
    Sum { fields: Vec<String> },
    Scale { field: String, factor: f64 },
}

impl Formula {
    pub fn evaluate(&self, row: &Row) -> f64 {
        let num = |field: &str| row.value(field).as_number();
        match self {
            Formula::Ratio {
                numerator,
                denominator,
            } => {
                let d = num(denominator);
                if d == 0.0 {
                    0.0
                } else {
                    num(numerator) / d
                }
            }
            Formula::Product { left, right } => num(left) * num(right),
            Formula::Difference { left, right } => num(left) - num(right),
            Formula::Sum { fields } => fields.iter().map(|f| num(f)).sum(),
            Formula::Scale { field, factor } => num(field) * factor,
        }
    }
}
