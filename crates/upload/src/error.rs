//! Error types for the upload workflow.

use kobo_api::ApiError;
use kobo_tabular::TabularError;
use kobo_xform::XformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Xform(#[from] XformError),

    #[error(transparent)]
    Tabular(#[from] TabularError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Neither the asset nor the deployed forms yield a form ID.
    #[error("could not determine the form ID for asset {asset}")]
    FormIdUnresolved { asset: String },
}

pub type Result<T> = std::result::Result<T, UploadError>;
