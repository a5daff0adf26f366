//! # kobo-upload
//!
//! Bulk creation and editing of KoboToolbox submissions from spreadsheet rows.
//!
//! The library holds the command line configuration ([`UploadConfig`]) and the
//! submission workflow ([`workflow`]); the `kobo-upload` binary wires them to a
//! [`kobo_api::KoboClient`].

pub mod config;
pub mod error;
pub mod workflow;

pub use config::{Command, ServerChoice, SubmitArgs, UploadConfig};
pub use error::{Result, UploadError};
pub use workflow::{
    LoadedForm, Mode, PreparedRows, RowReport, RowStatus, RunSummary, SubmissionRunner, Verdict,
    prepare_rows,
};

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kobo_upload={level},kobo_api={level},kobo_xform={level},kobo_tabular={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
