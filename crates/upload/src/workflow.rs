//! Submission workflow: loading a form, preparing uploaded rows and submitting
//! them one by one.
//!
//! Rows never abort a run. Each row ends in exactly one [`RowStatus`] and the run
//! produces a [`RunSummary`] with one [`RowReport`] per row.

use std::fmt;

use kobo_api::{KoboApi, resolve_form_id};
use kobo_xform::{
    Asset, ExistingIdSet, IdNormalization, InstanceId, KnownRecords, Row, SchemaMap, Table,
    TargetResolution, Template, encode_submission, normalize_update_ids, resolve_target,
};
use tracing::{debug, info, warn};

use crate::error::{Result, UploadError};

/// Characters of the target token quoted in "ID not found" details.
const SHORT_ID_LEN: usize = 8;
/// Characters of an encoding error quoted in the report.
const MAX_ERROR_DETAIL_CHARS: usize = 100;

/// Whether rows create new submissions or replace existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Edit,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Edit => write!(f, "edit"),
        }
    }
}

/// A project ready for submissions.
#[derive(Debug, Clone)]
pub struct LoadedForm {
    pub asset: Asset,
    pub form_id: String,
    pub template: Template,
}

impl LoadedForm {
    /// Fetches the asset, resolves its form ID and derives the template.
    pub async fn load<A>(api: &A, asset_uid: &str) -> Result<Self>
    where
        A: KoboApi + ?Sized,
    {
        let asset = api.get_asset(asset_uid).await?;
        let form_id = resolve_form_id(api, &asset)
            .await?
            .ok_or_else(|| UploadError::FormIdUnresolved {
                asset: asset_uid.to_string(),
            })?;
        let template = Template::from_asset(&asset);
        if template.schema().is_empty() {
            warn!(asset = %asset_uid, "Form has no data questions");
        }
        info!(
            asset = %asset_uid,
            name = %asset.display_name(),
            form_id = %form_id,
            columns = template.columns().len(),
            "Loaded form"
        );
        Ok(Self {
            asset,
            form_id,
            template,
        })
    }
}

/// Uploaded rows after mode-specific preparation.
#[derive(Debug, Clone)]
pub struct PreparedRows {
    pub rows: Vec<Row>,
    /// Identifier fixes applied in edit mode.
    pub normalization: Option<IdNormalization>,
    pub blank_rows_dropped: usize,
}

/// Prepares an uploaded table for submission.
///
/// Create mode keeps only template columns. Edit mode normalizes the identifier
/// columns. Rows without any value are dropped in both modes.
pub fn prepare_rows(mut table: Table, mode: Mode, template: &Template) -> PreparedRows {
    let normalization = match mode {
        Mode::Create => {
            table.retain_columns(template.columns());
            None
        }
        Mode::Edit => Some(normalize_update_ids(&mut table)),
    };

    let before = table.len();
    table.drop_blank_rows();
    let blank_rows_dropped = before - table.len();

    let normalized = normalization.and_then(|n| n.describe()).unwrap_or_default();
    info!(
        mode = %mode,
        rows = table.len(),
        blank_rows_dropped,
        normalized = %normalized,
        "Prepared rows"
    );
    PreparedRows {
        rows: table.into_rows(),
        normalization,
        blank_rows_dropped,
    }
}

/// Final state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Accepted by the server (including duplicates).
    Ok,
    /// Rejected by the server.
    Failed,
    /// Could not be encoded or sent.
    Error,
    /// Not submitted because its edit target is unknown.
    Skipped,
}

impl RowStatus {
    /// Returns true for statuses counted as failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Failed => write!(f, "FAIL"),
            Self::Error => write!(f, "ERROR"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Report line for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    /// 1-based position among the submitted rows.
    pub row: usize,
    pub status: RowStatus,
    pub detail: String,
}

impl RowReport {
    fn new(row: usize, status: RowStatus, detail: impl Into<String>) -> Self {
        Self {
            row,
            status,
            detail: detail.into(),
        }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AllSucceeded,
    Partial,
    NoneSucceeded,
    NothingProcessed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllSucceeded => write!(f, "All rows submitted successfully"),
            Self::Partial => write!(f, "Some rows failed or were skipped, check the report"),
            Self::NoneSucceeded => write!(f, "No rows submitted successfully, check the report"),
            Self::NothingProcessed => write!(f, "No rows were processed"),
        }
    }
}

/// Per-row reports and their counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    reports: Vec<RowReport>,
}

impl RunSummary {
    pub fn reports(&self) -> &[RowReport] {
        &self.reports
    }

    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| s == RowStatus::Ok)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| s.is_failure())
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| s == RowStatus::Skipped)
    }

    fn count(&self, predicate: impl Fn(RowStatus) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(r.status)).count()
    }

    pub fn verdict(&self) -> Verdict {
        if self.reports.is_empty() {
            Verdict::NothingProcessed
        } else if self.succeeded() == self.processed() {
            Verdict::AllSucceeded
        } else if self.succeeded() > 0 {
            Verdict::Partial
        } else {
            Verdict::NoneSucceeded
        }
    }

    /// The report as CSV with a UTF-8 BOM: `row,status,detail`.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let records = self
            .reports
            .iter()
            .map(|r| [r.row.to_string(), r.status.to_string(), r.detail.clone()]);
        Ok(kobo_tabular::csv_with_bom(&["row", "status", "detail"], records)?)
    }
}

/// Submits prepared rows for one form.
pub struct SubmissionRunner<'a, A: KoboApi + ?Sized> {
    api: &'a A,
    asset_uid: &'a str,
    form_id: &'a str,
    schema: &'a SchemaMap,
    mode: Mode,
}

impl<'a, A: KoboApi + ?Sized> SubmissionRunner<'a, A> {
    pub fn new(
        api: &'a A,
        asset_uid: &'a str,
        form_id: &'a str,
        schema: &'a SchemaMap,
        mode: Mode,
    ) -> Self {
        Self {
            api,
            asset_uid,
            form_id,
            schema,
            mode,
        }
    }

    /// Runner for a loaded form.
    pub fn for_form(api: &'a A, form: &'a LoadedForm, mode: Mode) -> Self {
        Self::new(
            api,
            &form.asset.uid,
            &form.form_id,
            form.template.schema(),
            mode,
        )
    }

    /// Processes `rows` in order.
    ///
    /// Only failing to fetch existing submissions in edit mode aborts the run; every
    /// per-row problem is recorded in the summary instead.
    pub async fn run(&self, rows: &[Row]) -> Result<RunSummary> {
        let known = match self.mode {
            Mode::Create => None,
            Mode::Edit => Some(self.api.fetch_known_records(self.asset_uid).await?),
        };
        let existing = known.as_ref().map(KnownRecords::existing_ids);

        let mut summary = RunSummary::default();
        for (idx, row) in rows.iter().enumerate() {
            let number = idx + 1;
            debug!(row = number, total = rows.len(), "Processing row");
            let report = self
                .process_row(number, row, known.as_ref(), existing.as_ref())
                .await;
            if report.status != RowStatus::Ok {
                warn!(row = number, status = %report.status, detail = %report.detail, "Row not submitted");
            }
            summary.reports.push(report);
        }

        info!(
            form_id = %self.form_id,
            processed = summary.processed(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn process_row(
        &self,
        number: usize,
        row: &Row,
        known: Option<&KnownRecords>,
        existing: Option<&ExistingIdSet>,
    ) -> RowReport {
        let target = match self.mode {
            Mode::Create => None,
            Mode::Edit => match edit_target(row, known, existing) {
                Ok(target) => Some(target),
                Err(detail) => return RowReport::new(number, RowStatus::Skipped, detail),
            },
        };

        for unknown in self.schema.unknown_choices(row) {
            warn!(
                row = number,
                path = %unknown.path,
                list = %unknown.list_name,
                choice = %unknown.token,
                "Choice not declared in the form"
            );
        }

        let deprecated = target.as_ref().map(InstanceId::as_str);
        let encoded = match encode_submission(row, self.form_id, self.schema, deprecated) {
            Ok(encoded) => encoded,
            Err(err) => {
                let detail = format!("Error: {}", truncate_chars(&err.to_string(), MAX_ERROR_DETAIL_CHARS));
                return RowReport::new(number, RowStatus::Error, detail);
            }
        };
        if number == 1 {
            debug!(xml = %encoded.xml_str(), "Submission preview");
        }

        match self.api.post_submission(encoded.xml).await {
            Ok(outcome) if outcome.is_success() => {
                RowReport::new(number, RowStatus::Ok, outcome.to_string())
            }
            Ok(outcome) => RowReport::new(number, RowStatus::Failed, outcome.to_string()),
            Err(err) => RowReport::new(number, RowStatus::Error, format!("Submission error: {err}")),
        }
    }
}

/// The instance an edit row replaces, or the skip reason.
fn edit_target(
    row: &Row,
    known: Option<&KnownRecords>,
    existing: Option<&ExistingIdSet>,
) -> std::result::Result<InstanceId, String> {
    let resolution = resolve_target(row, known);
    if let TargetResolution::ByNumericId { numeric_id, .. } = &resolution {
        debug!(numeric_id = *numeric_id, "Edit target found by numeric ID");
    }
    let Some(target) = resolution.into_instance_id() else {
        return Err("No target ID".to_string());
    };
    if existing.is_some_and(|ids| !ids.contains_id(&target)) {
        return Err(format!("ID not found: {}...", target.short(SHORT_ID_LEN)));
    }
    Ok(target)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kobo_xform::KnownRecord;

    fn known() -> KnownRecords {
        [KnownRecord {
            numeric_id: Some(42),
            alt_uuid: Some("abc".to_string()),
            instance_id: InstanceId::parse("abc").unwrap(),
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_edit_target_direct_and_numeric() {
        let known = known();
        let existing = known.existing_ids();

        let row = Row::new().with("meta/instanceID", "uuid:abc");
        let target = edit_target(&row, Some(&known), Some(&existing)).unwrap();
        assert_eq!(target.as_str(), "uuid:abc");

        let row = Row::new().with("_id", "42.0");
        let target = edit_target(&row, Some(&known), Some(&existing)).unwrap();
        assert_eq!(target.as_str(), "uuid:abc");
    }

    #[test]
    fn test_edit_target_skip_reasons() {
        let known = known();
        let existing = known.existing_ids();

        let err = edit_target(&Row::new().with("_id", "7"), Some(&known), Some(&existing))
            .unwrap_err();
        assert_eq!(err, "No target ID");

        let row = Row::new().with("_uuid", "0123456789abcdef");
        let err = edit_target(&row, Some(&known), Some(&existing)).unwrap_err();
        assert_eq!(err, "ID not found: 01234567...");
    }

    #[test]
    fn test_summary_counts_and_verdict() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.verdict(), Verdict::NothingProcessed);

        summary.reports = vec![
            RowReport::new(1, RowStatus::Ok, "Submitted successfully"),
            RowReport::new(2, RowStatus::Failed, "400: bad"),
            RowReport::new(3, RowStatus::Error, "Submission error: timeout"),
            RowReport::new(4, RowStatus::Skipped, "No target ID"),
        ];
        assert_eq!(summary.processed(), 4);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.verdict(), Verdict::Partial);

        summary.reports.retain(|r| r.status != RowStatus::Ok);
        assert_eq!(summary.verdict(), Verdict::NoneSucceeded);
    }

    #[test]
    fn test_report_csv() {
        let summary = RunSummary {
            reports: vec![RowReport::new(1, RowStatus::Failed, "400: {\"a\": 1}")],
        };
        let csv = summary.to_csv().unwrap();
        assert!(csv.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(csv[3..].to_vec()).unwrap();
        assert_eq!(text, "row,status,detail\n1,FAIL,\"400: {\"\"a\"\": 1}\"\n");
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Create.to_string(), "create");
        assert_eq!(Mode::Edit.to_string(), "edit");
    }
}
