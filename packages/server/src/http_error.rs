//! HTTP error handling
//!
//! Every failed request answers with a JSON body `{message, code, details?}`.
//! The status code is derived from `code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use arbor_core::tree::TreeError;
use arbor_core::ServiceError;

/// JSON error response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "NODE_NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_STRUCTURAL_MOVE" | "VALIDATION_ERROR" | "TYPE_MISMATCH" | "DUPLICATE_ID" => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Tree(tree_err) => {
                let code = match tree_err {
                    TreeError::NodeNotFound { .. } => "NODE_NOT_FOUND",
                    TreeError::InvalidStructuralMove { .. } => "INVALID_STRUCTURAL_MOVE",
                    TreeError::TypeMismatch { .. } => "TYPE_MISMATCH",
                    TreeError::DuplicateId { .. } => "DUPLICATE_ID",
                    TreeError::InvalidMetricValue { .. } | TreeError::ValidationError(_) => {
                        "VALIDATION_ERROR"
                    }
                };
                HttpError::new(message, code)
            }
            ServiceError::Store(store_err) => {
                tracing::error!("storage failure: {:?}", store_err);
                HttpError::with_details(message, "STORAGE_ERROR", format!("{:?}", store_err))
            }
        }
    }
}
