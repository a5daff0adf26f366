//! Template and upload files on disk.

use std::io::Write;

use kobo_tabular::{TabularError, read_table_path, template_xlsx, write_template};
use kobo_xform::{QuestionNode, SurveyDefinition, Template};
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

fn template() -> Template {
    Template::from_survey(&SurveyDefinition {
        questions: vec![
            QuestionNode::new("text", "name"),
            QuestionNode::new("geopoint", "loc"),
        ],
        choice_lists: Vec::new(),
    })
}

#[test]
fn test_csv_template_round_trips_as_upload_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("form_template.csv");
    let template = template();
    write_template(&path, template.columns()).unwrap();

    let table = read_table_path(&path, Some(template.columns())).unwrap();
    assert_eq!(table.columns(), template.columns());
    assert!(table.is_empty());
}

#[test]
fn test_xlsx_template_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("form_template.xlsx");
    write_template(&path, template().columns()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.len() > 100);
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn test_upload_trimmed_to_template_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("upload.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "name,extra,loc_latitude,loc_longitude").unwrap();
    writeln!(file, "Ann,ignored,1.5,2.5").unwrap();
    drop(file);

    let template = template();
    let table = read_table_path(&path, Some(template.columns())).unwrap();
    assert_eq!(table.columns(), &["name", "loc_latitude", "loc_longitude"]);
    assert_eq!(table.rows()[0].value("loc_longitude"), Some("2.5"));
}

#[test]
fn test_xlsx_template_reads_back_as_upload_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("form_template.xlsx");
    let template = template();
    std::fs::write(&path, template_xlsx(template.columns()).unwrap()).unwrap();

    let table = read_table_path(&path, Some(template.columns())).unwrap();
    assert_eq!(table.columns(), template.columns());
    assert!(table.is_empty());
}

#[test]
fn test_filled_xlsx_upload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filled.xlsx");
    let template = template();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let mut col = 0u16;
    for column in template.columns() {
        sheet.write_string(0, col, column).unwrap();
        col += 1;
    }
    sheet.write_string(0, col, "extra").unwrap();
    sheet.write_string(1, 0, "Ann").unwrap();
    sheet.write_number(1, 1, 12.5).unwrap();
    sheet.write_number(1, 2, -1.0).unwrap();
    sheet.write_string(1, col, "ignored").unwrap();
    sheet.write_string(2, 0, "Bob").unwrap();
    workbook.save(&path).unwrap();

    let table = read_table_path(&path, Some(template.columns())).unwrap();
    assert_eq!(table.columns(), template.columns());
    assert_eq!(table.len(), 2);
    let first = &table.rows()[0];
    assert_eq!(first.value("name"), Some("Ann"));
    assert_eq!(first.value("loc_latitude"), Some("12.5"));
    assert_eq!(first.value("loc_longitude"), Some("-1"));
    assert_eq!(first.value("loc_altitude"), None);
    assert!(!first.has_column("extra"));
    assert_eq!(table.rows()[1].value("name"), Some("Bob"));
    assert_eq!(table.rows()[1].value("loc_latitude"), None);
}

#[test]
fn test_written_xlsx_template_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("form_template.xlsx");
    write_template(&path, template().columns()).unwrap();
    let table = read_table_path(&path, None).unwrap();
    assert_eq!(table.columns(), template().columns());
}

#[test]
fn test_xls_upload_rejected_with_hint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("upload.xls");
    std::fs::write(&path, b"legacy").unwrap();
    let err = read_table_path(&path, None).unwrap_err();
    assert!(matches!(err, TabularError::UnsupportedFormat { .. }));
    assert!(err.to_string().contains("CSV"));
}
