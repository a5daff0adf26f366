//! Error types for table I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("XLSX read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    /// The file type cannot be read; the message tells the user what to do instead.
    #[error("unsupported file format {extension:?}: {hint}")]
    UnsupportedFormat { extension: String, hint: String },

    /// More columns than a worksheet can hold.
    #[error("too many columns for a worksheet: {count}")]
    TooManyColumns { count: usize },

    /// The file has no header row.
    #[error("file has no header row")]
    MissingHeader,
}

pub type Result<T> = std::result::Result<T, TabularError>;
