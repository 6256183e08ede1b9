use crate::schema::DatasetName;
use log::{error, warn};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("missing required dataset: {0}")]
    MissingDataset(DatasetName),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Completion service returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to fetch dataset {dataset}: {details}")]
    DatasetFetch { dataset: DatasetName, details: String },

    #[cfg(feature = "remote")]
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InsightError>;

/// Coarse classification used when the error crosses the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Upstream,
    Internal,
}

impl InsightError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::MissingDataset(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Upstream { .. } => ErrorKind::Upstream,
            _ => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Upstream => 502,
            ErrorKind::Configuration | ErrorKind::Internal => 500,
        }
    }

    pub(crate) fn validation(details: impl Into<String>) -> Self {
        Self::Validation(details.into())
    }
}

/// Public error body. Internal failures never expose their details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn from_error(err: &InsightError) -> Self {
        let status = err.status_code();
        match err.kind() {
            ErrorKind::Validation => Self {
                status,
                error: err.to_string(),
                details: None,
            },
            ErrorKind::Configuration => {
                warn!("Report request rejected: {}", err);
                Self {
                    status,
                    error: "completion service is not configured".to_string(),
                    details: None,
                }
            }
            ErrorKind::Upstream => {
                warn!("Completion service failure: {}", err);
                let details = match err {
                    InsightError::Upstream { status, body } => Some(json!({
                        "upstream_status": status,
                        "upstream_body": body,
                    })),
                    _ => None,
                };
                Self {
                    status,
                    error: "completion service request failed".to_string(),
                    details,
                }
            }
            ErrorKind::Internal => {
                error!("Internal error while building report: {}", err);
                Self {
                    status,
                    error: "internal error".to_string(),
                    details: None,
                }
            }
        }
    }
}

impl From<&InsightError> for ErrorResponse {
    fn from(err: &InsightError) -> Self {
        Self::from_error(err)
    }
}
