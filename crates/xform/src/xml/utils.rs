//! Helpers shared by the encoder and decoder.

use crate::error::{Result, XformError};

/// Meta block element name.
pub const META: &str = "meta";
/// Instance ID element inside the meta block.
pub const INSTANCE_ID: &str = "instanceID";
/// Deprecated (replaced) instance ID element inside the meta block.
pub const DEPRECATED_ID: &str = "deprecatedID";

/// Checks whether `name` is usable as an XML element name.
///
/// Accepts the XML 1.0 name production restricted to what XLSForm allows:
/// a letter or `_` first, then letters, digits, `_`, `-`, `.` or `:`.
pub fn is_valid_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Returns an error unless `name` is a valid element name.
pub fn check_element_name(name: &str, context: &str) -> Result<()> {
    if is_valid_element_name(name) {
        Ok(())
    } else {
        Err(XformError::InvalidElementName {
            name: name.to_string(),
            context: context.to_string(),
        })
    }
}

/// Splits a schema path into its element names.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
