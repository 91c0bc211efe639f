//! Reading a single export file: delimiter sniffing, header check, rows.

use crate::error::{Result, ZenSheetError};
use crate::schema::{header_matches, Record, FIELD_COUNT};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Returns the first candidate delimiter that splits `header` into exactly
/// the schema field names.
pub fn sniff_delimiter(header: &str, candidates: &[char]) -> Option<u8> {
    let header = header.trim_end_matches(['\r', '\n']);

    candidates
        .iter()
        .filter(|c| c.is_ascii())
        .find(|&&c| header_matches(header.split(c).map(|h| h.trim_matches('"'))))
        .map(|&c| c as u8)
}

/// Opens `path`, skips a UTF-8 byte-order mark and returns the reader
/// positioned at the header together with the raw header line.
fn open_at_header(path: &Path) -> Result<(BufReader<File>, String)> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut bom = [0u8; 3];
    let read = read_up_to(&mut reader, &mut bom)?;
    if read < 3 || bom != UTF8_BOM {
        reader.seek(SeekFrom::Start(0))?;
    }

    let mut header = String::new();
    reader.read_line(&mut header)?;

    Ok((reader, header))
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Reads the header only and reports whether the file follows the export
/// schema with one of `delimiters`.
pub fn detect_schema(path: &Path, delimiters: &[char]) -> Result<u8> {
    let (_, header) = open_at_header(path)?;

    if header.trim().is_empty() {
        return Err(ZenSheetError::SchemaMismatch {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }

    sniff_delimiter(&header, delimiters).ok_or_else(|| ZenSheetError::SchemaMismatch {
        path: path.display().to_string(),
        reason: format!(
            "header does not list the {} export columns",
            FIELD_COUNT
        ),
    })
}

/// Reads every data row of an export file as raw records.
pub fn read_records(path: &Path, delimiters: &[char]) -> Result<Vec<Record>> {
    let delimiter = detect_schema(path, delimiters)?;
    let (reader, _) = open_at_header(path)?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| ZenSheetError::Csv {
            message: format!("{} row {}: {}", path.display(), i + 1, e),
            source: e,
        })?;

        // Trailing blank lines come through as a single empty field
        if row.len() == 1 && row.get(0).is_some_and(|v| v.trim().is_empty()) {
            continue;
        }

        let record = Record::from_raw(row.iter()).map_err(|_| ZenSheetError::SchemaMismatch {
            path: path.display().to_string(),
            reason: format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                FIELD_COUNT
            ),
        })?;
        records.push(record);
    }

    Ok(records)
}
