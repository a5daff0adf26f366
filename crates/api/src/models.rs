//! Wire types for the KPI and KoBoCAT endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One page of a paginated KPI listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// A deployed form as listed by KoBoCAT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KcForm {
    pub id_string: Option<String>,
    pub title: Option<String>,
}

impl KcForm {
    pub fn new(id_string: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id_string: Some(id_string.into()),
            title: Some(title.into()),
        }
    }

    /// Non-blank form identifier.
    pub fn id_string(&self) -> Option<&str> {
        self.id_string.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Body of the export creation request.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub source: String,
    #[serde(rename = "type")]
    pub export_type: &'static str,
    pub fields_from_all_versions: bool,
    pub hierarchy_in_labels: bool,
    pub group_sep: &'static str,
    pub lang: &'static str,
    pub multiple_select: &'static str,
}

impl ExportRequest {
    /// Full XLSX export of `source`, with XML names and `/`-joined group paths.
    pub fn xlsx(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            export_type: "xls",
            fields_from_all_versions: true,
            hierarchy_in_labels: true,
            group_sep: "/",
            lang: "_xml",
            multiple_select: "summary",
        }
    }
}

/// Export task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Created,
    Processing,
    Complete,
    Error,
    #[serde(other)]
    Unknown,
}

/// Export task as returned by creation and status requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportTask {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub status: Option<ExportState>,
    /// Download URL, set once the export is complete.
    #[serde(default)]
    pub result: Option<String>,
}

/// Result of posting one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// 200, 201 or 202.
    Accepted,
    /// 409: the server already holds this instance.
    Duplicate,
    /// Any other status, with the server's message.
    Rejected { status: u16, message: String },
}

impl SubmissionOutcome {
    /// Returns true for accepted and duplicate submissions.
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted | SubmissionOutcome::Duplicate)
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Accepted => write!(f, "Submitted successfully"),
            SubmissionOutcome::Duplicate => write!(f, "Duplicate (already exists)"),
            SubmissionOutcome::Rejected { status, message } => write!(f, "{status}: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_request_body() {
        let body = serde_json::to_value(ExportRequest::xlsx("https://kf/api/v2/assets/a/data/"))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "source": "https://kf/api/v2/assets/a/data/",
                "type": "xls",
                "fields_from_all_versions": true,
                "hierarchy_in_labels": true,
                "group_sep": "/",
                "lang": "_xml",
                "multiple_select": "summary"
            })
        );
    }

    #[test]
    fn test_export_state_unknown() {
        let task: ExportTask =
            serde_json::from_value(json!({"uid": "e1", "status": "queued"})).unwrap();
        assert_eq!(task.status, Some(ExportState::Unknown));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_outcome_messages() {
        assert!(SubmissionOutcome::Duplicate.is_success());
        let rejected = SubmissionOutcome::Rejected {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!rejected.is_success());
        assert_eq!(rejected.to_string(), "400: bad");
    }

    #[test]
    fn test_kc_form_blank_id() {
        let form: KcForm = serde_json::from_value(json!({"id_string": " ", "title": "x"})).unwrap();
        assert_eq!(form.id_string(), None);
    }
}
