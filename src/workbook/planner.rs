use crate::schema::Field;
use crate::scanner::SourceClass;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const TOTAL_SHEET: &str = "Total";
pub const CONFIG_SHEET: &str = "Config";
pub const DATE_COLUMN_FORMAT: &str = "DD/MM/YYYY";
pub const DATETIME_COLUMN_FORMAT: &str = "DD/MM/YYYY HH:MM:SS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// The input file already is the workbook.
    PassThrough,
    /// CSV sources are merged into a new workbook.
    Aggregate,
}

impl JobMode {
    pub fn from_class(class: SourceClass) -> Self {
        if class.is_pass_through() {
            JobMode::PassThrough
        } else {
            JobMode::Aggregate
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::PassThrough => f.write_str("pass-through"),
            JobMode::Aggregate => f.write_str("aggregate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkbookPlan {
    pub destination: PathBuf,
    pub sheets: Vec<String>,
    /// Display format → column letters it applies to.
    pub date_columns: BTreeMap<String, Vec<String>>,
}

impl WorkbookPlan {
    /// A plan without sheets reuses the file at `destination` untouched.
    pub fn is_reuse(&self) -> bool {
        self.sheets.is_empty()
    }
}

/// Workbook file stem for `timestamp`: ISO-8601 to the second with the
/// colons replaced, e.g. `2024-03-15T10-20-30`.
pub fn workbook_stem(timestamp: NaiveDateTime) -> String {
    timestamp
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
        .replace(':', "-")
}

pub fn default_date_columns() -> BTreeMap<String, Vec<String>> {
    let letters = |fields: &[Field]| {
        fields
            .iter()
            .map(|f| f.column_letter().to_string())
            .collect::<Vec<_>>()
    };

    BTreeMap::from([
        (DATE_COLUMN_FORMAT.to_string(), letters(&[Field::Date])),
        (
            DATETIME_COLUMN_FORMAT.to_string(),
            letters(&[Field::CreatedDate, Field::ChangedDate]),
        ),
    ])
}

/// Decides where the job writes and what the workbook looks like.
///
/// `input` is expected to be absolute already; the planner does no I/O.
pub fn plan(
    mode: JobMode,
    input: &Path,
    class: SourceClass,
    timestamp: NaiveDateTime,
    extension: &str,
) -> WorkbookPlan {
    match mode {
        JobMode::PassThrough => WorkbookPlan {
            destination: input.to_path_buf(),
            sheets: Vec::new(),
            date_columns: BTreeMap::new(),
        },
        JobMode::Aggregate => {
            let directory = if class.is_single_file {
                input.parent().unwrap_or(input)
            } else {
                input
            };
            let filename = format!("{}.{}", workbook_stem(timestamp), extension);

            WorkbookPlan {
                destination: directory.join(filename),
                sheets: vec![TOTAL_SHEET.to_string(), CONFIG_SHEET.to_string()],
                date_columns: default_date_columns(),
            }
        }
    }
}
