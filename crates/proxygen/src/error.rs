use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::fetch::FetchError;

/// Failure to bring the service up.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid PORT value {value:?}")]
    InvalidPort {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error(transparent)]
    Storage(#[from] proxygen_core::Error),

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error")]
    Serve(#[source] std::io::Error),
}

/// Request failure rendered as `{"detail": "..."}` with a matching status.
#[derive(Debug, thiserror::Error)]
#[error("{detail}")]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized access")
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: &self.detail,
        });
        (self.status, body).into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(e) => Self::new(
                StatusCode::BAD_GATEWAY,
                format!("Network error fetching profile: {e}"),
            ),
            FetchError::Status { status, url } => Self::new(
                status,
                format!("Remote server error: status {status} for url {url}"),
            ),
        }
    }
}
