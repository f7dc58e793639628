use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error taxonomy for the send and tracking pipelines. Each variant maps to a
/// stable machine-readable code and an HTTP status; the tracking pixel route
/// never returns any of these to the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("email quota exceeded")]
    QuotaExceeded,

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("not authorized")]
    Unauthorized,
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::QuotaExceeded => "QUOTA_EXCEEDED",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Delivery(_) => "DELIVERY_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Persistence(_) => "PERSISTENCE_ERROR",
            Error::Unauthorized => "UNAUTHORIZED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::QuotaExceeded => StatusCode::FORBIDDEN,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Delivery(_) => StatusCode::BAD_GATEWAY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if matches!(self, Error::Persistence(_)) {
            tracing::error!(error = %self, "request failed on store write");
        }
        let body = Json(serde_json::json!({
            "ok": false,
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
