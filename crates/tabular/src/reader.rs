//! Reading uploaded tables.
//!
//! All cells end up as text. CSV cells are kept verbatim and XLSX cells are
//! rendered to text. Empty cells become "no value" in the resulting [`Table`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use kobo_xform::Table;
use tracing::debug;

use crate::error::{Result, TabularError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    Xls,
}

impl TableFormat {
    /// Detects the format from the file extension. Unknown extensions are read as CSV.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") => Self::Xlsx,
            Some("xls") => Self::Xls,
            _ => Self::Csv,
        }
    }
}

/// Reads a table from a file, dispatching on its extension.
///
/// When `allow_list` is given only those columns are kept.
pub fn read_table_path(path: &Path, allow_list: Option<&[String]>) -> Result<Table> {
    match TableFormat::from_path(path) {
        TableFormat::Csv => {
            let file = File::open(path)?;
            read_csv(file, allow_list)
        }
        TableFormat::Xlsx => {
            let file = BufReader::new(File::open(path)?);
            read_xlsx(file, allow_list)
        }
        TableFormat::Xls => Err(TabularError::UnsupportedFormat {
            extension: "xls".to_string(),
            hint: "legacy .xls is not supported, save the sheet as CSV (UTF-8)".to_string(),
        }),
    }
}

/// Reads CSV text. A leading UTF-8 BOM is skipped; input that is not valid UTF-8 is
/// decoded as latin-1.
pub fn read_csv<R: Read>(mut reader: R, allow_list: Option<&[String]>) -> Result<Table> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = decode_text(&bytes);

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TabularError::MissingHeader);
    }

    let mut records = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let mut table = Table::from_records(headers, records);
    if let Some(allowed) = allow_list {
        table.retain_columns(allowed);
    }
    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        "Read CSV table"
    );
    Ok(table)
}

/// Reads the first worksheet of an XLSX workbook. The first row is the header.
///
/// Numbers come back in their shortest text form (`42`, `1.5`), so an `_id`
/// column exported by the server reads the same as it would from CSV.
pub fn read_xlsx<R: Read + Seek>(reader: R, allow_list: Option<&[String]>) -> Result<Table> {
    let mut workbook: Xlsx<R> = Xlsx::new(reader)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(TabularError::MissingHeader);
    };
    let range = range?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(TabularError::MissingHeader);
    };
    let headers: Vec<String> = header.iter().map(cell_text).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TabularError::MissingHeader);
    }
    let records = rows.map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

    let mut table = Table::from_records(headers, records);
    if let Some(allowed) = allow_list {
        table.retain_columns(allowed);
    }
    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        "Read XLSX table"
    );
    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        other => other.to_string(),
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("Input is not valid UTF-8, decoding as latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}
