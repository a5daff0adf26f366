//! Writing templates and reports.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::error::{Result, TabularError};
use crate::reader::TableFormat;

/// Worksheet name used for XLSX templates.
pub const TEMPLATE_SHEET: &str = "Template";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 60;

/// Template header row as CSV bytes.
pub fn template_csv(columns: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    writer.into_inner().map_err(|e| TabularError::Io(e.into_error()))
}

/// Template header row as an XLSX workbook with a single `Template` sheet.
///
/// The header is bold and frozen, and each column is sized to its header.
pub fn template_xlsx(columns: &[String]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET)?;
    for (idx, column) in columns.iter().enumerate() {
        let col = u16::try_from(idx).map_err(|_| TabularError::TooManyColumns {
            count: columns.len(),
        })?;
        worksheet.write_string_with_format(0, col, column, &header_format)?;
        worksheet.set_column_width(col, column_width(column))?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

fn column_width(header: &str) -> f64 {
    (header.chars().count() + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH) as f64
}

/// Writes the template to `path` as XLSX or CSV, chosen by extension.
pub fn write_template(path: &Path, columns: &[String]) -> Result<()> {
    let bytes = match TableFormat::from_path(path) {
        TableFormat::Xlsx => template_xlsx(columns)?,
        TableFormat::Csv => template_csv(columns)?,
        TableFormat::Xls => {
            return Err(TabularError::UnsupportedFormat {
                extension: "xls".to_string(),
                hint: "write the template as .xlsx or .csv".to_string(),
            });
        }
    };
    std::fs::write(path, bytes)?;
    debug!(path = %path.display(), columns = columns.len(), "Wrote template");
    Ok(())
}

/// CSV bytes prefixed with a UTF-8 BOM so spreadsheet applications detect the
/// encoding.
pub fn csv_with_bom<I, R>(header: &[&str], records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.into_inner().map_err(|e| TabularError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_csv() {
        let columns = vec!["g/a".to_string(), "meta/instanceID".to_string()];
        let bytes = template_csv(&columns).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "g/a,meta/instanceID\n");
    }

    #[test]
    fn test_template_xlsx_is_zip() {
        let columns = vec!["name".to_string(), "_id".to_string()];
        let bytes = template_xlsx(&columns).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_column_width_bounds() {
        assert_eq!(column_width("a"), 10.0);
        assert_eq!(column_width("household/members_count"), 25.0);
        assert_eq!(column_width(&"x".repeat(200)), 60.0);
    }

    #[test]
    fn test_csv_with_bom() {
        let bytes = csv_with_bom(&["row", "status"], vec![vec!["1", "OK"]]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], b"row,status\n1,OK\n");
    }
}
