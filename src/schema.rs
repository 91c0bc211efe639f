//! Fixed layout of a ZenMoney transaction export.
//!
//! Every record is positional: field `n` of a row always means the same
//! column, so the rest of the crate indexes records by [`Field`] rather than
//! by header name once a file has been accepted.

use crate::error::{Result, ZenSheetError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

pub const FIELD_COUNT: usize = 12;

/// Header names in export order.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "date",
    "categoryName",
    "payee",
    "comment",
    "outcomeAccountName",
    "outcome",
    "outcomeCurrencyShortTitle",
    "incomeAccountName",
    "income",
    "incomeCurrencyShortTitle",
    "createdDate",
    "changedDate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Date,
    CategoryName,
    Payee,
    Comment,
    OutcomeAccountName,
    Outcome,
    OutcomeCurrencyShortTitle,
    IncomeAccountName,
    Income,
    IncomeCurrencyShortTitle,
    CreatedDate,
    ChangedDate,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Date,
        Field::CategoryName,
        Field::Payee,
        Field::Comment,
        Field::OutcomeAccountName,
        Field::Outcome,
        Field::OutcomeCurrencyShortTitle,
        Field::IncomeAccountName,
        Field::Income,
        Field::IncomeCurrencyShortTitle,
        Field::CreatedDate,
        Field::ChangedDate,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FIELD_NAMES[self.index()]
    }

    /// Spreadsheet column letter the field lands in (`A` for the first field).
    pub fn column_letter(self) -> char {
        (b'A' + self.index() as u8) as char
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of a record, either still raw text or coerced to a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Amount(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }

    /// Display form used for the plain-text parts of the output.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%d/%m/%Y").to_string(),
            FieldValue::DateTime(dt) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
            FieldValue::Amount(a) => a.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: [FieldValue; FIELD_COUNT],
}

impl Record {
    /// Builds a raw record from a CSV row. The row must have exactly
    /// [`FIELD_COUNT`] values.
    pub fn from_raw<I, S>(row: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<FieldValue> = row
            .into_iter()
            .map(|s| FieldValue::Text(s.into()))
            .collect();
        let len = values.len();

        let values: [FieldValue; FIELD_COUNT] =
            values
                .try_into()
                .map_err(|_| ZenSheetError::SchemaMismatch {
                    path: "<record>".to_string(),
                    reason: format!("expected {} fields, found {}", FIELD_COUNT, len),
                })?;

        Ok(Self { values })
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.values[field.index()] = value;
    }

    pub fn values(&self) -> &[FieldValue; FIELD_COUNT] {
        &self.values
    }
}

/// Checks a header row against [`FIELD_NAMES`], ignoring surrounding
/// whitespace and a leading byte-order mark.
pub fn header_matches<'a, I>(header: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut count = 0;
    for (i, name) in header.into_iter().enumerate() {
        let name = if i == 0 {
            name.trim_start_matches('\u{feff}')
        } else {
            name
        };
        if i >= FIELD_COUNT || name.trim() != FIELD_NAMES[i] {
            return false;
        }
        count += 1;
    }
    count == FIELD_COUNT
}
