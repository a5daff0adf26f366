//! # kobo-api
//!
//! Async client for the two KoboToolbox services the uploader talks to: the KPI
//! form-management API (projects, form content, existing data, exports) and the
//! KoBoCAT data-collection endpoint that receives submissions.
//!
//! Everything the upload workflow needs goes through the [`KoboApi`] trait, which
//! [`KoboClient`] implements over HTTP.

pub mod client;
pub mod error;
pub mod form_id;
pub mod models;
pub mod server;

pub use client::{ClientConfig, KoboApi, KoboClient};
pub use error::{ApiError, Result};
pub use form_id::{choose_form_id, resolve_form_id};
pub use models::{ExportRequest, ExportState, ExportTask, KcForm, Page, SubmissionOutcome};
pub use server::{DATA_PAGE_SIZE, ServerPreset, USER_AGENT, join_url, normalize_base_url};
