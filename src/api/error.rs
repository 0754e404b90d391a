//! HTTP error envelope.
//!
//! ```json
//! { "status": 422, "title": "Validation Failed", "detail": "...",
//!   "errors": [{ "code": "hierarchy.cycle", "message": "...", "taxon_id": "..." }] }
//! ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taxon_core::{TaxonomyError, Violation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub title: String,
    pub detail: String,
    #[serde(default)]
    pub errors: Vec<Violation>,
}

/// Handler error: every service failure converts into this via `?`, and the
/// extractors in [`crate::api::extract`] reject with it.
#[derive(Debug)]
pub enum AppError {
    Service(TaxonomyError),
    /// The request could not be read; keeps the extractor's status.
    Rejected { status: StatusCode, detail: String },
}

impl From<TaxonomyError> for AppError {
    fn from(e: TaxonomyError) -> Self {
        Self::Service(e)
    }
}

macro_rules! rejection_into_app_error {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for AppError {
                fn from(rejection: $rejection) -> Self {
                    Self::Rejected {
                        status: rejection.status(),
                        detail: rejection.body_text(),
                    }
                }
            }
        )+
    };
}

rejection_into_app_error!(JsonRejection, PathRejection, QueryRejection);

impl AppError {
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Service(err) => service_envelope(err),
            Self::Rejected { status, detail } => ErrorEnvelope {
                status: status.as_u16(),
                title: status.canonical_reason().unwrap_or("Bad Request").to_string(),
                detail: detail.clone(),
                errors: Vec::new(),
            },
        }
    }
}

fn service_envelope(err: &TaxonomyError) -> ErrorEnvelope {
    let detail = match err {
        TaxonomyError::NotFound(what) => format!("{what} does not exist"),
        TaxonomyError::Validation(v) => match v.as_slice() {
            [only] => only.message.clone(),
            many => format!("{} violations", many.len()),
        },
        // Causes stay in the log.
        TaxonomyError::Failure(_) => "an internal error occurred".to_string(),
    };
    ErrorEnvelope {
        status: err.http_status(),
        title: err.title().to_string(),
        detail,
        errors: err.violations().to_vec(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Service(TaxonomyError::Failure(cause)) => {
                tracing::error!(error = %format!("{cause:#}"), "request failed")
            }
            Self::Service(TaxonomyError::Validation(v)) => {
                tracing::debug!(violations = v.len(), "request rejected")
            }
            Self::Rejected { status, detail } => {
                tracing::debug!(%status, %detail, "request unreadable")
            }
            Self::Service(TaxonomyError::NotFound(_)) => {}
        }
        let envelope = self.envelope();
        let status =
            StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}
