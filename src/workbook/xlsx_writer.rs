use crate::error::{Result, ZenSheetError};
use crate::schema::{FieldValue, Record, FIELD_NAMES};
use crate::workbook::planner::{WorkbookPlan, CONFIG_SHEET, DATE_COLUMN_FORMAT, TOTAL_SHEET};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_SHEET_NAME_LEN: usize = 31;
const SOURCE_COLUMN: &str = "source";
const WRITE_TEST_FILE: &str = ".zensheet_write_test";

/// Normalized records plus the key/value lines for the `Config` sheet.
#[derive(Debug, Clone, Default)]
pub struct WorkbookContent {
    pub sources: BTreeMap<String, Vec<Record>>,
    pub metadata: Vec<(String, String)>,
}

/// Capability the job needs from the spreadsheet side.
pub trait WorkbookSink {
    type Handle;

    /// Prepares the destination described by `plan` without writing data.
    fn create(&mut self, plan: &WorkbookPlan) -> Result<Self::Handle>;

    /// Writes `content` and returns the full path of the workbook.
    fn write(&mut self, handle: Self::Handle, content: &WorkbookContent) -> Result<PathBuf>;

    /// Non-fatal remarks gathered since the last call, such as a leftover
    /// write-test file.
    fn take_notes(&mut self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug)]
pub enum XlsxHandle {
    Existing(PathBuf),
    New {
        destination: PathBuf,
        sheets: Vec<String>,
        column_formats: BTreeMap<u16, ColumnFormat>,
    },
}

#[derive(Debug, Clone)]
pub struct ColumnFormat {
    pub format: Format,
    pub width: f64,
}

pub struct XlsxWorkbookWriter {
    per_source_sheets: bool,
    overwrite: bool,
    notes: Vec<String>,
}

impl XlsxWorkbookWriter {
    pub fn new() -> Self {
        Self {
            per_source_sheets: true,
            overwrite: false,
            notes: Vec::new(),
        }
    }

    pub fn with_per_source_sheets(mut self, enabled: bool) -> Self {
        self.per_source_sheets = enabled;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn validate_destination(&mut self, destination: &Path) -> Result<()> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        if !parent.is_dir() {
            return Err(ZenSheetError::Workbook {
                message: format!("Output directory does not exist: {}", parent.display()),
                source: None,
            });
        }

        if destination.exists() && !self.overwrite {
            return Err(ZenSheetError::Workbook {
                message: format!("Workbook already exists: {}", destination.display()),
                source: None,
            });
        }

        // Test write permissions
        let test_file = parent.join(WRITE_TEST_FILE);
        match fs::File::create(&test_file) {
            Ok(_) => self.remove_write_test(&test_file),
            Err(e) => {
                return Err(ZenSheetError::Permission {
                    path: format!("No write permission for directory {}: {}", parent.display(), e),
                });
            }
        }

        Ok(())
    }

    fn remove_write_test(&mut self, test_file: &Path) {
        if let Err(e) = fs::remove_file(test_file) {
            self.notes.push(format!(
                "Could not remove write test file {}: {}",
                test_file.display(),
                e
            ));
        }
    }

    fn build_sheet(
        &self,
        name: &str,
        records: &[(&str, &Record)],
        with_source_column: bool,
        column_formats: &BTreeMap<u16, ColumnFormat>,
    ) -> std::result::Result<Worksheet, XlsxError> {
        let mut sheet = Worksheet::new();
        sheet.set_name(name)?;

        let header_format = Format::new().set_bold();
        for (col, title) in FIELD_NAMES.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        if with_source_column {
            sheet.write_string_with_format(0, FIELD_NAMES.len() as u16, SOURCE_COLUMN, &header_format)?;
        }
        sheet.set_freeze_panes(1, 0)?;

        for (&col, column) in column_formats {
            sheet.set_column_format(col, &column.format)?;
            sheet.set_column_width(col, column.width)?;
        }

        for (i, (source, record)) in records.iter().enumerate() {
            let row = (i + 1) as u32;
            for (col, value) in record.values().iter().enumerate() {
                write_value(&mut sheet, row, col as u16, value, column_formats)?;
            }
            if with_source_column {
                sheet.write_string(row, FIELD_NAMES.len() as u16, *source)?;
            }
        }

        Ok(sheet)
    }

    fn build_config_sheet(&self, metadata: &[(String, String)]) -> std::result::Result<Worksheet, XlsxError> {
        let mut sheet = Worksheet::new();
        sheet.set_name(CONFIG_SHEET)?;

        let header_format = Format::new().set_bold();
        sheet.write_string_with_format(0, 0, "key", &header_format)?;
        sheet.write_string_with_format(0, 1, "value", &header_format)?;
        sheet.set_column_width(0, 24.0)?;
        sheet.set_column_width(1, 60.0)?;

        for (i, (key, value)) in metadata.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, key)?;
            sheet.write_string(row, 1, value)?;
        }

        Ok(sheet)
    }
}

impl Default for XlsxWorkbookWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookSink for XlsxWorkbookWriter {
    type Handle = XlsxHandle;

    fn create(&mut self, plan: &WorkbookPlan) -> Result<XlsxHandle> {
        if plan.is_reuse() {
            if !plan.destination.is_file() {
                return Err(ZenSheetError::InvalidPath {
                    path: format!("{} is not an existing workbook", plan.destination.display()),
                });
            }
            return Ok(XlsxHandle::Existing(plan.destination.clone()));
        }

        self.validate_destination(&plan.destination)?;

        let mut column_formats = BTreeMap::new();
        for (display, letters) in &plan.date_columns {
            let width = if display.len() > DATE_COLUMN_FORMAT.len() { 20.0 } else { 12.0 };
            for letter in letters {
                let col = column_index(letter).ok_or_else(|| ZenSheetError::Workbook {
                    message: format!("Invalid column letter '{}' for format {}", letter, display),
                    source: None,
                })?;
                column_formats.insert(
                    col,
                    ColumnFormat {
                        format: Format::new().set_num_format(excel_num_format(display)),
                        width,
                    },
                );
            }
        }

        Ok(XlsxHandle::New {
            destination: plan.destination.clone(),
            sheets: plan.sheets.clone(),
            column_formats,
        })
    }

    fn write(&mut self, handle: XlsxHandle, content: &WorkbookContent) -> Result<PathBuf> {
        let (destination, sheets, column_formats) = match handle {
            XlsxHandle::Existing(path) => return Ok(path),
            XlsxHandle::New {
                destination,
                sheets,
                column_formats,
            } => (destination, sheets, column_formats),
        };

        let mut workbook = Workbook::new();
        let mut used_names: HashSet<String> = sheets.iter().map(|s| s.to_lowercase()).collect();

        for sheet_name in &sheets {
            match sheet_name.as_str() {
                TOTAL_SHEET => {
                    let rows: Vec<(&str, &Record)> = content
                        .sources
                        .iter()
                        .flat_map(|(source, records)| records.iter().map(move |r| (source.as_str(), r)))
                        .collect();
                    workbook.push_worksheet(self.build_sheet(TOTAL_SHEET, &rows, true, &column_formats)?);

                    if self.per_source_sheets {
                        for (source, records) in &content.sources {
                            let name = unique_sheet_name(source, &mut used_names);
                            let rows: Vec<(&str, &Record)> =
                                records.iter().map(|r| (source.as_str(), r)).collect();
                            workbook.push_worksheet(self.build_sheet(&name, &rows, false, &column_formats)?);
                        }
                    }
                }
                CONFIG_SHEET => {
                    workbook.push_worksheet(self.build_config_sheet(&content.metadata)?);
                }
                other => {
                    let mut sheet = Worksheet::new();
                    sheet.set_name(other)?;
                    workbook.push_worksheet(sheet);
                }
            }
        }

        workbook.save(&destination).map_err(|e| ZenSheetError::Workbook {
            message: format!("Failed to save {}: {}", destination.display(), e),
            source: Some(e),
        })?;

        Ok(destination)
    }

    fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }
}

fn write_value(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &FieldValue,
    column_formats: &BTreeMap<u16, ColumnFormat>,
) -> std::result::Result<(), XlsxError> {
    let date_format = || {
        column_formats
            .get(&col)
            .map(|c| c.format.clone())
            .unwrap_or_else(|| Format::new().set_num_format(excel_num_format(DATE_COLUMN_FORMAT)))
    };

    match value {
        FieldValue::Text(s) if s.is_empty() => {}
        FieldValue::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        FieldValue::Amount(a) => {
            sheet.write_number(row, col, *a)?;
        }
        FieldValue::Date(d) => match excel_date(*d) {
            Ok(dt) => {
                sheet.write_datetime_with_format(row, col, &dt, &date_format())?;
            }
            Err(_) => {
                sheet.write_string(row, col, value.display())?;
            }
        },
        FieldValue::DateTime(dt) => match excel_datetime(*dt) {
            Ok(excel) => {
                sheet.write_datetime_with_format(row, col, &excel, &date_format())?;
            }
            Err(_) => {
                sheet.write_string(row, col, value.display())?;
            }
        },
    }

    Ok(())
}

/// Dates Excel cannot represent (before 1900) fall back to text.
fn excel_date(date: NaiveDate) -> std::result::Result<ExcelDateTime, XlsxError> {
    let year = u16::try_from(date.year()).unwrap_or(0);
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)
}

fn excel_datetime(datetime: NaiveDateTime) -> std::result::Result<ExcelDateTime, XlsxError> {
    excel_date(datetime.date())?.and_hms(
        datetime.hour() as u16,
        datetime.minute() as u8,
        datetime.second() as f64,
    )
}

/// `DD/MM/YYYY HH:MM:SS` → `dd/mm/yyyy hh:mm:ss`.
pub fn excel_num_format(display: &str) -> String {
    display.to_lowercase()
}

/// Zero-based column index for a spreadsheet column name (`A` → 0, `AA` → 26).
pub fn column_index(letters: &str) -> Option<u16> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    u16::try_from(index - 1).ok()
}

/// Turns a source file name into a valid, unused worksheet name.
pub fn unique_sheet_name(source: &str, used: &mut HashSet<String>) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);

    let mut base = String::new();
    for ch in stem.chars() {
        match ch {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => base.push('_'),
            c => base.push(c),
        }
    }

    let mut suffix = 1;
    loop {
        let tag = if suffix == 1 { String::new() } else { format!("~{}", suffix) };
        let room = MAX_SHEET_NAME_LEN - tag.chars().count();

        // Trim after truncating: the cut may expose an apostrophe
        let truncated: String = base.chars().take(room).collect();
        let trimmed = truncated.trim_matches(|c| c == '\'' || c == ' ');
        let trimmed = if trimmed.is_empty() { "source" } else { trimmed };
        let candidate = format!("{}{}", trimmed, tag);

        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}
