//! # kobo-tabular
//!
//! File-level table I/O around the mapping engine: reading uploaded CSV and XLSX files into
//! [`kobo_xform::Table`]s, and writing upload templates (CSV or XLSX) and
//! submission reports.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{Result, TabularError};
pub use reader::{TableFormat, read_csv, read_table_path, read_xlsx};
pub use writer::{TEMPLATE_SHEET, csv_with_bom, template_csv, template_xlsx, write_template};
