//! Row to submission XML.
//!
//! The document shape follows the schema paths, not the column order:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <household_v1 id="household_v1">
//!   <hh><members>4</members></hh>
//!   <loc>12.5 -1.25 0 0.0</loc>
//!   <assets>radio bicycle</assets>
//!   <meta>
//!     <instanceID>uuid:4f0c...</instanceID>
//!     <deprecatedID>uuid:9a1b...</deprecatedID>
//!   </meta>
//! </household_v1>
//! ```
//!
//! Blank cells and incomplete geopoints produce no element at all.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::{Result, XformError};
use crate::ids::InstanceId;
use crate::row::Row;
use crate::schema::{GeoComponent, SchemaEntry, SchemaMap, split_select_tokens};
use crate::survey::QuestionType;
use crate::xml::tree::Element;
use crate::xml::utils::{self, DEPRECATED_ID, INSTANCE_ID, META};

const DEFAULT_ALTITUDE: &str = "0";
const DEFAULT_PRECISION: &str = "0.0";

/// An encoded submission and the instance ID freshly assigned to it.
#[derive(Debug, Clone)]
pub struct EncodedSubmission {
    pub instance_id: InstanceId,
    pub deprecated_id: Option<InstanceId>,
    pub xml: Vec<u8>,
}

impl EncodedSubmission {
    /// The document as text.
    pub fn xml_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.xml)
    }

    /// Returns true when this submission replaces an existing one.
    pub fn is_update(&self) -> bool {
        self.deprecated_id.is_some()
    }
}

/// Encodes one row as submission XML bytes.
///
/// `deprecated_id`, when given and non-blank, marks the document as an edit of that
/// submission. A blank `deprecated_id` (`Some("")`, `Some("  ")`) is the same as
/// `None` and yields a create document without `meta/deprecatedID`.
pub fn row_to_xml(
    row: &Row,
    form_id: &str,
    schema: &SchemaMap,
    deprecated_id: Option<&str>,
) -> Result<Vec<u8>> {
    Ok(encode_submission(row, form_id, schema, deprecated_id)?.xml)
}

/// Encodes one row and returns the document with its identifiers.
///
/// Blank `deprecated_id` values are treated as `None`, see [`row_to_xml`].
pub fn encode_submission(
    row: &Row,
    form_id: &str,
    schema: &SchemaMap,
    deprecated_id: Option<&str>,
) -> Result<EncodedSubmission> {
    let deprecated_id = deprecated_id.and_then(InstanceId::parse);
    let instance_id = InstanceId::generate();
    let root = build_submission(row, form_id, schema, &instance_id, deprecated_id.as_ref())?;

    let mut xml = Vec::new();
    root.write_document(&mut xml)?;

    Ok(EncodedSubmission {
        instance_id,
        deprecated_id,
        xml,
    })
}

/// Builds the element tree for a row with the given identifiers.
pub fn build_submission(
    row: &Row,
    form_id: &str,
    schema: &SchemaMap,
    instance_id: &InstanceId,
    deprecated_id: Option<&InstanceId>,
) -> Result<Element> {
    let form_id = form_id.trim();
    if form_id.is_empty() {
        return Err(XformError::MissingFormId);
    }
    utils::check_element_name(form_id, "form identifier")?;

    let mut root = Element::new(form_id).with_attribute("id", form_id);
    let mut geopoints_seen: HashSet<&str> = HashSet::new();
    let mut emitted = 0usize;

    for entry in schema {
        let Some((path, value)) = field_value(row, entry, &mut geopoints_seen) else {
            continue;
        };
        insert_leaf(&mut root, path, value)?;
        emitted += 1;
    }

    let meta = root.child_or_insert(META);
    meta.child_or_insert(INSTANCE_ID).set_text(instance_id.as_str());
    if let Some(deprecated) = deprecated_id {
        meta.child_or_insert(DEPRECATED_ID)
            .set_text(deprecated.as_str());
    }

    debug!(
        form_id = %form_id,
        fields = emitted,
        instance_id = %instance_id,
        update = deprecated_id.is_some(),
        "Built submission"
    );
    Ok(root)
}

/// Computes the element path and text for one schema entry, if it has a value.
fn field_value<'a>(
    row: &Row,
    entry: &'a SchemaEntry,
    geopoints_seen: &mut HashSet<&'a str>,
) -> Option<(&'a str, String)> {
    match entry.question_type() {
        QuestionType::Geopoint => {
            let Some((base, _)) = entry.geo_component() else {
                trace!(path = %entry.path, "Geopoint column without a component suffix");
                return None;
            };
            if !geopoints_seen.insert(base) {
                return None;
            }
            geopoint_value(row, base).map(|value| (base, value))
        }
        QuestionType::SelectMultiple => {
            let raw = row.value(&entry.path)?;
            let tokens: Vec<&str> = split_select_tokens(raw).collect();
            if tokens.is_empty() {
                return None;
            }
            Some((entry.path.as_str(), tokens.join(" ")))
        }
        _ => row
            .value(&entry.path)
            .map(|value| (entry.path.as_str(), value.to_string())),
    }
}

/// `"<lat> <lon> <alt> <precision>"`, or `None` unless both coordinates are set.
fn geopoint_value(row: &Row, base: &str) -> Option<String> {
    let latitude = row.value(&GeoComponent::Latitude.column(base));
    let longitude = row.value(&GeoComponent::Longitude.column(base));
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        if latitude.is_some() || longitude.is_some() {
            trace!(path = %base, "Omitting incomplete geopoint");
        }
        return None;
    };
    let altitude = row
        .value(&GeoComponent::Altitude.column(base))
        .unwrap_or(DEFAULT_ALTITUDE);
    let precision = row
        .value(&GeoComponent::Precision.column(base))
        .unwrap_or(DEFAULT_PRECISION);
    Some(format!("{latitude} {longitude} {altitude} {precision}"))
}

fn insert_leaf(root: &mut Element, path: &str, value: String) -> Result<()> {
    let segments: Vec<&str> = utils::path_segments(path).collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Ok(());
    };
    for segment in &segments {
        utils::check_element_name(segment, path)?;
    }
    root.ensure_path(parents.iter().copied())
        .push_child(leaf)
        .set_text(value);
    Ok(())
}
