//! Error types for the mapping engine.
//!
//! Only caller contract violations and XML-level failures are errors. Per-field and
//! per-row anomalies (blank values, partial geopoints, unresolvable edit rows) are
//! reported as values by the operations that encounter them.

use thiserror::Error;

/// The error type for schema, encoding and decoding operations.
#[derive(Error, Debug)]
pub enum XformError {
    /// The form identifier passed to the encoder was empty.
    #[error("form identifier is required to build a submission")]
    MissingFormId,

    /// A form identifier or path segment cannot be used as an XML element name.
    #[error("invalid XML element name {name:?} (from {context})")]
    InvalidElementName { name: String, context: String },

    /// The submission document could not be read.
    #[error("malformed submission XML: {0}")]
    MalformedXml(String),

    /// XML writer or reader failure.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// IO error while writing the document buffer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Survey definition JSON could not be decoded.
    #[error("invalid survey definition: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for mapping engine operations.
pub type Result<T> = std::result::Result<T, XformError>;
