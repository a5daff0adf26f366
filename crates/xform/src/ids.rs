//! Submission identifiers and update targeting.
//!
//! Instance IDs travel in two textual forms, bare (`<token>`) and prefixed
//! (`uuid:<token>`). Everything in this module normalizes to the prefixed form
//! before comparing, so both spellings of the same submission compare equal.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::row::{Row, Table};
use crate::template::{INSTANCE_ID_COLUMN, NUMERIC_ID_COLUMN, UUID_COLUMN};

/// Canonical instance ID prefix.
pub const UUID_PREFIX: &str = "uuid:";

/// Column names tried, in order, when an uploaded table has no `meta/instanceID`.
pub const INSTANCE_ID_FALLBACK_COLUMNS: [&str; 9] = [
    "meta_instanceID",
    "meta/instanceid",
    "instanceID",
    "instance_id",
    "_uuid",
    "__uuid",
    "uuid",
    "submission_uuid",
    "_submission__uuid",
];

/// Normalizes an identifier to `uuid:<token>` form.
///
/// Surrounding whitespace is trimmed and any existing prefixes are collapsed into
/// one. Blank input stays blank.
pub fn ensure_uuid_prefix(raw: &str) -> String {
    let token = bare_token(raw);
    if token.is_empty() {
        return String::new();
    }
    format!("{UUID_PREFIX}{token}")
}

/// Returns the identifier without any `uuid:` prefix.
pub fn bare_token(raw: &str) -> &str {
    let mut token = raw.trim();
    while let Some(rest) = token.strip_prefix(UUID_PREFIX) {
        token = rest.trim_start();
    }
    token
}

/// A submission instance ID in canonical `uuid:<token>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Parses either textual form. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = ensure_uuid_prefix(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Generates a fresh random (v4) instance ID.
    pub fn generate() -> Self {
        Self(format!("{UUID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Prefixed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare token.
    pub fn token(&self) -> &str {
        bare_token(&self.0)
    }

    /// First `len` characters of the token, for log and report messages.
    pub fn short(&self, len: usize) -> &str {
        let token = self.token();
        match token.char_indices().nth(len) {
            Some((idx, _)) => &token[..idx],
            None => token,
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An existing submission on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownRecord {
    /// Platform numeric ID (`_id`).
    pub numeric_id: Option<u64>,
    /// Alternate UUID (`_uuid`), as reported.
    pub alt_uuid: Option<String>,
    /// Canonical instance ID.
    pub instance_id: InstanceId,
}

/// Existing submissions, deduplicated by instance ID.
///
/// Both the duplicate check on insert and the `_id` lookup are hash lookups, so
/// building the collection and resolving rows against it stay linear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownRecords {
    records: Vec<KnownRecord>,
    instance_ids: HashSet<InstanceId>,
    by_numeric_id: HashMap<u64, NumericIdMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericIdMatch {
    Unique(usize),
    Ambiguous,
}

impl KnownRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record unless one with the same instance ID is already present.
    pub fn push(&mut self, record: KnownRecord) -> bool {
        if !self.instance_ids.insert(record.instance_id.clone()) {
            return false;
        }
        if let Some(numeric_id) = record.numeric_id {
            let index = self.records.len();
            self.by_numeric_id
                .entry(numeric_id)
                .and_modify(|m| *m = NumericIdMatch::Ambiguous)
                .or_insert(NumericIdMatch::Unique(index));
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[KnownRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the instance ID of the only record with `numeric_id`.
    /// Zero or several matches yield `None`.
    pub fn unique_by_numeric_id(&self, numeric_id: u64) -> Option<&InstanceId> {
        match self.by_numeric_id.get(&numeric_id)? {
            NumericIdMatch::Unique(index) => Some(&self.records[*index].instance_id),
            NumericIdMatch::Ambiguous => None,
        }
    }

    /// Builds the membership set used to validate edit targets.
    pub fn existing_ids(&self) -> ExistingIdSet {
        ExistingIdSet::from_records(self)
    }
}

impl FromIterator<KnownRecord> for KnownRecords {
    fn from_iter<I: IntoIterator<Item = KnownRecord>>(iter: I) -> Self {
        let mut records = Self::new();
        for record in iter {
            records.push(record);
        }
        records
    }
}

/// Known instance IDs in both prefixed and bare form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingIdSet {
    ids: HashSet<String>,
}

impl ExistingIdSet {
    pub fn from_records(records: &KnownRecords) -> Self {
        let mut ids = HashSet::with_capacity(records.len() * 2);
        for record in records.records() {
            ids.insert(record.instance_id.as_str().to_string());
            ids.insert(record.instance_id.token().to_string());
        }
        Self { ids }
    }

    /// Membership test for either textual form, as given.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id.trim())
    }

    pub fn contains_id(&self, id: &InstanceId) -> bool {
        self.ids.contains(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// How an edit row's target was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    /// The row named the instance directly (`meta/instanceID` or `_uuid`).
    Direct(InstanceId),
    /// The row's `_id` matched exactly one known record.
    ByNumericId { numeric_id: u64, instance_id: InstanceId },
    /// No target could be determined; the row must be skipped.
    Unresolved,
}

impl TargetResolution {
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            Self::Direct(id) | Self::ByNumericId { instance_id: id, .. } => Some(id),
            Self::Unresolved => None,
        }
    }

    pub fn into_instance_id(self) -> Option<InstanceId> {
        match self {
            Self::Direct(id) | Self::ByNumericId { instance_id: id, .. } => Some(id),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// Parses a numeric submission ID cell. Spreadsheet round-trips may render
/// integers as `"42.0"`, which is accepted.
pub fn parse_numeric_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<u64>() {
        return Some(id);
    }
    let float: f64 = raw.parse().ok()?;
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
        Some(float as u64)
    } else {
        None
    }
}

/// Resolves which existing submission an edit row replaces.
pub fn resolve_target(row: &Row, known: Option<&KnownRecords>) -> TargetResolution {
    for column in [INSTANCE_ID_COLUMN, UUID_COLUMN] {
        if let Some(id) = row.value(column).and_then(InstanceId::parse) {
            return TargetResolution::Direct(id);
        }
    }

    let numeric_id = row.value(NUMERIC_ID_COLUMN).and_then(parse_numeric_id);
    if let (Some(numeric_id), Some(known)) = (numeric_id, known)
        && let Some(instance_id) = known.unique_by_numeric_id(numeric_id)
    {
        return TargetResolution::ByNumericId {
            numeric_id,
            instance_id: instance_id.clone(),
        };
    }

    TargetResolution::Unresolved
}

/// What [`normalize_update_ids`] changed, for user-facing messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdNormalization {
    /// `meta/instanceID` was synthesized from a fallback column.
    pub created_from_uuid: bool,
    /// `meta/instanceID` values were rewritten to the prefixed form.
    pub standardized_prefix: bool,
}

impl IdNormalization {
    /// Short description such as `"created instanceID, standardized prefix"`.
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.created_from_uuid {
            parts.push("created instanceID");
        }
        if self.standardized_prefix {
            parts.push("standardized prefix");
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Prepares an uploaded edit table for target resolution.
///
/// Trims column names, synthesizes `meta/instanceID` from the first fallback
/// column found when it is missing, then normalizes every `meta/instanceID`
/// value to the prefixed form.
pub fn normalize_update_ids(table: &mut Table) -> IdNormalization {
    let mut info = IdNormalization::default();

    table.trim_column_names();

    if !table.has_column(INSTANCE_ID_COLUMN)
        && let Some(source) = INSTANCE_ID_FALLBACK_COLUMNS
            .iter()
            .find(|candidate| table.has_column(candidate))
    {
        debug!(source = %source, "Synthesizing meta/instanceID column");
        table.derive_column(source, INSTANCE_ID_COLUMN, ensure_uuid_prefix);
        info.created_from_uuid = true;
    }

    if table.has_column(INSTANCE_ID_COLUMN) {
        table.map_column(INSTANCE_ID_COLUMN, ensure_uuid_prefix);
        info.standardized_prefix = true;
    }

    info
}
