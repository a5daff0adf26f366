//! HTTP client for the KPI (form management) and KoBoCAT (data collection) APIs.

use std::time::Duration;

use async_trait::async_trait;
use kobo_xform::{Asset, InstanceId, KnownRecord, KnownRecords};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::models::{ExportRequest, ExportState, ExportTask, KcForm, Page, SubmissionOutcome};
use crate::server::{DATA_PAGE_SIZE, USER_AGENT, join_url, normalize_base_url};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Remote operations used by the upload workflow.
#[async_trait]
pub trait KoboApi: Send + Sync {
    /// Survey projects visible to the token, library items excluded.
    async fn list_assets(&self) -> Result<Vec<Asset>>;

    /// Full asset, including its form content.
    async fn get_asset(&self, uid: &str) -> Result<Asset>;

    /// Forms deployed on the data-collection server.
    async fn list_kc_forms(&self) -> Result<Vec<KcForm>>;

    /// Identifiers of every existing submission of an asset.
    async fn fetch_known_records(&self, asset_uid: &str) -> Result<KnownRecords>;

    /// Builds a full XLSX data export and downloads it.
    async fn export_data(&self, asset_uid: &str) -> Result<Vec<u8>>;

    /// Posts one submission document.
    ///
    /// Rejections by the server are an `Ok` outcome; only transport failures are
    /// errors.
    async fn post_submission(&self, xml: Vec<u8>) -> Result<SubmissionOutcome>;
}

/// Timeouts and export polling settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for metadata requests.
    pub request_timeout: Duration,
    /// Timeout for data pages and submissions.
    pub data_timeout: Duration,
    /// Timeout for downloading a finished export.
    pub download_timeout: Duration,
    pub export_poll_interval: Duration,
    pub export_max_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            data_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(120),
            export_poll_interval: Duration::from_secs(2),
            export_max_wait: Duration::from_secs(120),
        }
    }
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_export_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.export_poll_interval = interval;
        self.export_max_wait = max_wait;
        self
    }
}

/// [`KoboApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct KoboClient {
    http: Client,
    kf_base: String,
    kc_base: String,
    token: String,
    config: ClientConfig,
}

impl KoboClient {
    /// Creates a client. Both base URLs are normalized to `scheme://host[:port]`.
    pub fn new(kf_base: &str, kc_base: &str, token: impl Into<String>) -> Result<Self> {
        Self::with_config(kf_base, kc_base, token, ClientConfig::default())
    }

    pub fn with_config(
        kf_base: &str,
        kc_base: &str,
        token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            kf_base: normalize_base_url(kf_base),
            kc_base: normalize_base_url(kc_base),
            token: token.into().trim().to_string(),
            config,
        })
    }

    pub fn kf_base(&self) -> &str {
        &self.kf_base
    }

    pub fn kc_base(&self) -> &str {
        &self.kc_base
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header(AUTHORIZATION, format!("Token {}", self.token))
        }
    }

    fn api_get(&self, url: &str, timeout: Duration) -> RequestBuilder {
        self.authorize(self.http.get(url))
            .header(ACCEPT, "application/json")
            .timeout(timeout)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check_status("GET", request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Follows `next` links from `first_url`. The query is only sent with the first
    /// request since `next` links already carry it.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut next = Some(first_url);
        let mut first = true;
        while let Some(url) = next.take() {
            let mut request = self.api_get(&url, timeout);
            if first {
                request = request.query(query);
                first = false;
            }
            let page: Page<T> = self.get_json(request).await?;
            debug!(url = %url, items = page.results.len(), "Fetched page");
            results.extend(page.results);
            next = page.next.filter(|n| !n.is_empty() && *n != url);
        }
        Ok(results)
    }

    async fn wait_for_export(&self, status_url: &str) -> Result<String> {
        let started = Instant::now();
        while started.elapsed() < self.config.export_max_wait {
            let task: ExportTask = self
                .get_json(self.api_get(status_url, self.config.request_timeout))
                .await?;
            match task.status {
                Some(ExportState::Complete) => {
                    return task.result.filter(|r| !r.is_empty()).ok_or_else(|| {
                        ApiError::UnexpectedResponse(
                            "export completed but has no download URL".to_string(),
                        )
                    });
                }
                Some(ExportState::Error) => return Err(ApiError::ExportFailed),
                status => debug!(?status, "Export not ready"),
            }
            tokio::time::sleep(self.config.export_poll_interval).await;
        }
        Err(ApiError::ExportTimeout {
            waited_secs: self.config.export_max_wait.as_secs(),
        })
    }
}

#[async_trait]
impl KoboApi for KoboClient {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let url = join_url(&self.kf_base, "/api/v2/assets/");
        let query = [
            ("asset_type", "survey".to_string()),
            ("format", "json".to_string()),
        ];
        let assets: Vec<Asset> = self
            .get_all_pages(url, &query, self.config.request_timeout)
            .await?;
        Ok(assets.into_iter().filter(Asset::is_project).collect())
    }

    async fn get_asset(&self, uid: &str) -> Result<Asset> {
        let url = join_url(&self.kf_base, &format!("/api/v2/assets/{uid}/"));
        let request = self
            .api_get(&url, self.config.request_timeout)
            .query(&[("format", "json")]);
        self.get_json(request).await
    }

    async fn list_kc_forms(&self) -> Result<Vec<KcForm>> {
        let url = join_url(&self.kc_base, "/api/v1/forms");
        let body: Value = self
            .get_json(self.api_get(&url, self.config.request_timeout))
            .await?;
        match body {
            Value::Array(_) => Ok(serde_json::from_value(body)?),
            _ => {
                debug!("Form listing is not an array, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_known_records(&self, asset_uid: &str) -> Result<KnownRecords> {
        let url = join_url(&self.kf_base, &format!("/api/v2/assets/{asset_uid}/data/"));
        let query = [
            ("format", "json".to_string()),
            ("limit", DATA_PAGE_SIZE.to_string()),
        ];
        let submissions: Vec<Value> = self
            .get_all_pages(url, &query, self.config.data_timeout)
            .await?;
        let total = submissions.len();
        let records: KnownRecords = submissions.iter().filter_map(known_record).collect();
        info!(asset = %asset_uid, submissions = total, known = records.len(), "Fetched existing submissions");
        Ok(records)
    }

    async fn export_data(&self, asset_uid: &str) -> Result<Vec<u8>> {
        let exports_url = join_url(&self.kf_base, &format!("/api/v2/assets/{asset_uid}/exports/"));
        let source = join_url(&self.kf_base, &format!("/api/v2/assets/{asset_uid}/data/"));

        let request = self
            .authorize(self.http.post(&exports_url))
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .json(&ExportRequest::xlsx(source));
        let created: ExportTask = check_status("POST", request.send().await?)
            .await?
            .json()
            .await?;
        let export_uid = created.uid.filter(|u| !u.is_empty()).ok_or_else(|| {
            ApiError::UnexpectedResponse("export creation returned no uid".to_string())
        })?;
        info!(asset = %asset_uid, export = %export_uid, "Export started");

        let status_url = join_url(&exports_url, &format!("{export_uid}/"));
        let download_url = self.wait_for_export(&status_url).await?;

        let response = self
            .authorize(self.http.get(&download_url))
            .timeout(self.config.download_timeout)
            .send()
            .await?;
        let bytes = check_status("GET", response).await?.bytes().await?;
        info!(asset = %asset_uid, bytes = bytes.len(), "Export downloaded");
        Ok(bytes.to_vec())
    }

    async fn post_submission(&self, xml: Vec<u8>) -> Result<SubmissionOutcome> {
        let url = join_url(&self.kc_base, "/submission");
        let part = Part::bytes(xml)
            .file_name("submission.xml")
            .mime_str("text/xml")?;
        let form = Form::new().part("xml_submission_file", part);

        let response = self
            .authorize(self.http.post(&url))
            .timeout(self.config.data_timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                Ok(SubmissionOutcome::Accepted)
            }
            StatusCode::CONFLICT => Ok(SubmissionOutcome::Duplicate),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = error_message(&body);
                warn!(status = status.as_u16(), message = %message, "Submission rejected");
                Ok(SubmissionOutcome::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Turns a non-success response into [`ApiError::Status`].
async fn check_status(method: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        method,
        url,
        status: status.as_u16(),
        body: truncate_chars(&body, MAX_ERROR_BODY_CHARS).to_string(),
    })
}

/// JSON bodies verbatim, anything else cut to the first 500 characters.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => truncate_chars(body, MAX_ERROR_BODY_CHARS).to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extracts identifiers from one submission of the data endpoint.
///
/// The instance ID is `meta/instanceID`, falling back to `_uuid`. Submissions with
/// neither are ignored.
fn known_record(submission: &Value) -> Option<KnownRecord> {
    let text = |key: &str| {
        submission
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let alt_uuid = text("_uuid");
    let instance_id = text("meta/instanceID")
        .or(alt_uuid)
        .and_then(InstanceId::parse)?;
    let numeric_id = submission.get("_id").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    Some(KnownRecord {
        numeric_id,
        alt_uuid: alt_uuid.map(str::to_string),
        instance_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_record_prefers_instance_id() {
        let record = known_record(&json!({
            "_id": 42,
            "_uuid": "abc",
            "meta/instanceID": "uuid:def"
        }))
        .unwrap();
        assert_eq!(record.numeric_id, Some(42));
        assert_eq!(record.alt_uuid.as_deref(), Some("abc"));
        assert_eq!(record.instance_id.as_str(), "uuid:def");
    }

    #[test]
    fn test_known_record_falls_back_to_uuid() {
        let record = known_record(&json!({"_id": "7", "_uuid": "abc", "meta/instanceID": ""}))
            .unwrap();
        assert_eq!(record.numeric_id, Some(7));
        assert_eq!(record.instance_id.as_str(), "uuid:abc");
        assert!(known_record(&json!({"_id": 1})).is_none());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"detail": "nope"}"#), r#"{"detail":"nope"}"#);
        let long = "x".repeat(600);
        assert_eq!(error_message(&long).len(), 500);
        assert_eq!(error_message("plain"), "plain");
    }

    #[test]
    fn test_client_normalizes_bases() {
        let client = KoboClient::new("https://kf.example.org/#/forms", "https://kc.example.org/", " t ")
            .unwrap();
        assert_eq!(client.kf_base(), "https://kf.example.org");
        assert_eq!(client.kc_base(), "https://kc.example.org");
    }
}
