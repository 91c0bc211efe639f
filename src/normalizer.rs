//! Best-effort type coercion of raw export records.
//!
//! Each coercible field is handled on its own: a value that does not parse
//! stays as the original text and produces a [`CoercionWarning`], while the
//! remaining fields of the record are still converted.

use crate::schema::{Field, FieldValue, Record};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a single field is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Date,
    DateTime,
    DecimalAmount,
}

impl FieldRule {
    pub fn for_field(field: Field) -> Option<FieldRule> {
        match field {
            Field::Date => Some(FieldRule::Date),
            Field::CreatedDate | Field::ChangedDate => Some(FieldRule::DateTime),
            Field::Outcome | Field::Income => Some(FieldRule::DecimalAmount),
            _ => None,
        }
    }
}

/// A field that kept its original text because it did not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub original: String,
    pub reason: String,
}

impl fmt::Display for CoercionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.original, self.reason)
    }
}

pub type Coerced = std::result::Result<FieldValue, CoercionFailure>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionWarning {
    pub source: String,
    /// 1-based data row within the source file, header excluded.
    pub row: usize,
    pub field: Field,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {}: {} kept as text '{}' ({})",
            self.source, self.row, self.field, self.value, self.reason
        )
    }
}

pub fn coerce_date(raw: &str) -> Coerced {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(FieldValue::Date)
        .map_err(|e| CoercionFailure {
            original: raw.to_string(),
            reason: format!("expected YYYY-MM-DD: {}", e),
        })
}

pub fn coerce_datetime(raw: &str) -> Coerced {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
        .map(FieldValue::DateTime)
        .map_err(|e| CoercionFailure {
            original: raw.to_string(),
            reason: format!("expected YYYY-MM-DD HH:MM:SS: {}", e),
        })
}

/// Parses a locale amount such as `1234,56`. Empty input is returned as is.
/// `inf` and `NaN` spellings are rejected.
pub fn coerce_amount(raw: &str) -> Coerced {
    if raw.is_empty() {
        return Ok(FieldValue::Text(String::new()));
    }

    let amount = raw
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| CoercionFailure {
            original: raw.to_string(),
            reason: format!("not a number: {}", e),
        })?;

    if !amount.is_finite() {
        return Err(CoercionFailure {
            original: raw.to_string(),
            reason: "not a finite number".to_string(),
        });
    }

    Ok(FieldValue::Amount(amount))
}

fn coerce(rule: FieldRule, raw: &str) -> Coerced {
    match rule {
        FieldRule::Date => coerce_date(raw),
        FieldRule::DateTime => coerce_datetime(raw),
        FieldRule::DecimalAmount => coerce_amount(raw),
    }
}

#[derive(Debug, Default)]
pub struct FieldNormalizer {
    warnings: Vec<CoercionWarning>,
    // (source, row, field) already warned about
    reported: HashSet<(String, usize, Field)>,
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerces every rule-bearing field of `record` in place.
    ///
    /// Fields that are no longer text were coerced earlier and are skipped,
    /// and a field that already failed for the same source row is not
    /// reported twice, so a second pass over the same record is a no-op.
    pub fn normalize(&mut self, source: &str, row: usize, record: &mut Record) {
        for field in Field::ALL {
            let Some(rule) = FieldRule::for_field(field) else {
                continue;
            };
            let Some(raw) = record.get(field).as_text() else {
                continue;
            };

            match coerce(rule, raw) {
                Ok(value) => record.set(field, value),
                Err(failure) => {
                    if !self.reported.insert((source.to_string(), row, field)) {
                        continue;
                    }
                    self.warnings.push(CoercionWarning {
                        source: source.to_string(),
                        row,
                        field,
                        value: failure.original,
                        reason: failure.reason,
                    });
                }
            }
        }
    }

    pub fn normalize_all(&mut self, source: &str, records: &mut [Record]) {
        for (i, record) in records.iter_mut().enumerate() {
            self.normalize(source, i + 1, record);
        }
    }

    pub fn warnings(&self) -> &[CoercionWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<CoercionWarning> {
        self.warnings
    }
}
