//! Submission XML back to flat fields.
//!
//! Leaf elements become `(path, text)` pairs in document order, where `path` is the
//! slash-joined element names below the root. The `meta/instanceID` and
//! `meta/deprecatedID` leaves are returned separately.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, XformError};
use crate::ids::InstanceId;
use crate::row::Row;
use crate::schema::{GeoComponent, SchemaMap};
use crate::template::INSTANCE_ID_COLUMN;
use crate::xml::utils::{DEPRECATED_ID, INSTANCE_ID, META};

/// A parsed submission document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSubmission {
    /// Root element name.
    pub form_id: String,
    /// The root `id` attribute, when present.
    pub id_attribute: Option<String>,
    /// Data leaves in document order.
    pub fields: Vec<(String, String)>,
    pub instance_id: Option<InstanceId>,
    pub deprecated_id: Option<InstanceId>,
}

impl DecodedSubmission {
    /// Text of the first leaf at `path`.
    pub fn field(&self, path: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.as_str())
    }

    /// Maps the fields back onto template columns.
    ///
    /// Geopoint values are split into their four suffixed columns. Leaves that
    /// do not correspond to a schema column are kept under their own path. The
    /// instance ID, when present, lands in `meta/instanceID`.
    pub fn into_row(&self, schema: &SchemaMap) -> Row {
        let mut row = Row::new();
        for (path, value) in &self.fields {
            let latitude_column = GeoComponent::Latitude.column(path);
            let is_geopoint = !schema.contains(path)
                && schema
                    .get(&latitude_column)
                    .is_some_and(|e| e.geo_component().is_some());
            if is_geopoint {
                let mut parts = value.split_whitespace();
                for component in GeoComponent::ALL {
                    row.set(component.column(path), parts.next().map(str::to_string));
                }
            } else {
                row.set(path.clone(), Some(value.clone()));
            }
        }
        if let Some(id) = &self.instance_id {
            row.set(INSTANCE_ID_COLUMN, Some(id.as_str().to_string()));
        }
        row
    }
}

struct Frame {
    name: String,
    text: String,
    has_children: bool,
}

/// Parses submission XML bytes.
pub fn decode_submission(xml: &[u8]) -> Result<DecodedSubmission> {
    let xml = std::str::from_utf8(xml)
        .map_err(|e| XformError::MalformedXml(format!("invalid UTF-8: {e}")))?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut decoded = DecodedSubmission::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root_closed = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XformError::MalformedXml(e.to_string()))?;
        match event {
            Event::Start(start) => {
                open_element(&mut decoded, &mut stack, &start, root_closed)?;
            }
            Event::Empty(start) => {
                open_element(&mut decoded, &mut stack, &start, root_closed)?;
                close_element(&mut decoded, &mut stack, &mut root_closed);
            }
            Event::End(_) => {
                close_element(&mut decoded, &mut stack, &mut root_closed);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(text.as_ref()));
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Event::GeneralRef(reference) => {
                let name = String::from_utf8_lossy(reference.as_ref()).to_string();
                let resolved = resolve_reference(&name).ok_or_else(|| {
                    XformError::MalformedXml(format!("unknown entity reference &{name};"))
                })?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if !stack.is_empty() {
        return Err(XformError::MalformedXml(format!(
            "unclosed element <{}>",
            stack.last().map(|f| f.name.as_str()).unwrap_or_default()
        )));
    }
    if decoded.form_id.is_empty() {
        return Err(XformError::MalformedXml("document has no root element".into()));
    }
    Ok(decoded)
}

fn open_element(
    decoded: &mut DecodedSubmission,
    stack: &mut Vec<Frame>,
    start: &BytesStart<'_>,
    root_closed: bool,
) -> Result<()> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    if stack.is_empty() {
        if root_closed {
            return Err(XformError::MalformedXml(format!(
                "unexpected second root element <{name}>"
            )));
        }
        decoded.form_id = name.clone();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                XformError::MalformedXml(format!("failed to parse attribute: {e}"))
            })?;
            if attr.key.as_ref() == b"id" {
                decoded.id_attribute = Some(String::from_utf8_lossy(&attr.value).to_string());
            }
        }
    }
    if let Some(parent) = stack.last_mut() {
        parent.has_children = true;
    }
    stack.push(Frame {
        name,
        text: String::new(),
        has_children: false,
    });
    Ok(())
}

fn close_element(decoded: &mut DecodedSubmission, stack: &mut Vec<Frame>, root_closed: &mut bool) {
    let Some(frame) = stack.pop() else {
        return;
    };
    if stack.is_empty() {
        *root_closed = true;
        return;
    }
    if frame.has_children {
        return;
    }

    let path = stack
        .iter()
        .skip(1)
        .map(|f| f.name.as_str())
        .chain(std::iter::once(frame.name.as_str()))
        .collect::<Vec<_>>()
        .join("/");
    let text = frame.text.trim().to_string();

    if stack.len() == 2 && stack[1].name == META {
        match frame.name.as_str() {
            INSTANCE_ID => {
                decoded.instance_id = InstanceId::parse(&text);
                return;
            }
            DEPRECATED_ID => {
                decoded.deprecated_id = InstanceId::parse(&text);
                return;
            }
            _ => {}
        }
    }
    decoded.fields.push((path, text));
}

/// Resolves a predefined entity or character reference name (without `&`/`;`).
fn resolve_reference(name: &str) -> Option<String> {
    let predefined = match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    };
    if let Some(text) = predefined {
        return Some(text.to_string());
    }
    let code = name.strip_prefix('#')?;
    let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse::<u32>().ok()?,
    };
    char::from_u32(value).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nested_fields() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<f id="f">
  <g><a>1</a><b>two &amp; three</b></g>
  <name>Ann</name>
  <meta><instanceID>uuid:new</instanceID><deprecatedID>uuid:old</deprecatedID></meta>
</f>"#;
        let decoded = decode_submission(xml).unwrap();
        assert_eq!(decoded.form_id, "f");
        assert_eq!(decoded.id_attribute.as_deref(), Some("f"));
        assert_eq!(decoded.field("g/a"), Some("1"));
        assert_eq!(decoded.field("g/b"), Some("two & three"));
        assert_eq!(decoded.field("name"), Some("Ann"));
        assert_eq!(decoded.fields.len(), 3);
        assert_eq!(decoded.instance_id.unwrap().as_str(), "uuid:new");
        assert_eq!(decoded.deprecated_id.unwrap().as_str(), "uuid:old");
    }

    #[test]
    fn test_decode_empty_leaf_and_char_ref() {
        let xml = b"<f><x/><y>&#65;&#x42;</y></f>";
        let decoded = decode_submission(xml).unwrap();
        assert_eq!(decoded.field("x"), Some(""));
        assert_eq!(decoded.field("y"), Some("AB"));
        assert!(decoded.instance_id.is_none());
    }

    #[test]
    fn test_decode_rejects_unclosed() {
        assert!(decode_submission(b"<f><a>1</a>").is_err());
        assert!(decode_submission(b"").is_err());
    }

    #[test]
    fn test_resolve_reference() {
        assert_eq!(resolve_reference("lt").as_deref(), Some("<"));
        assert_eq!(resolve_reference("#233").as_deref(), Some("é"));
        assert_eq!(resolve_reference("#xE9").as_deref(), Some("é"));
        assert_eq!(resolve_reference("nbsp"), None);
    }
}
