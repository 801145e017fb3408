use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing {0}")]
    MissingParameter(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("Source not found")]
    SourceNotFound,

    /// upstream answered, just not with a 2xx
    #[error("{message}")]
    Upstream { status: u16, message: &'static str },

    #[error("Request timeout")]
    Timeout,

    #[error("Network error")]
    Network(String),

    #[error("internal server error")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SourceNotFound => StatusCode::NOT_FOUND,
            // players retry on standard statuses, so give them exactly what the origin said
            Self::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::InternalServerError | Self::InternalServerErrorWithContext(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// label used for the upstream error counter
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::BadRequest(_) => "bad_request",
            Self::SourceNotFound => "source_not_found",
            Self::Upstream { .. } => "upstream_status",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::InternalServerError | Self::InternalServerErrorWithContext(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Self::InternalServerErrorWithContext(ref context) = self {
            error!("internal error: {}", context);
        }

        // internals stay in the logs, the client only gets the generic message
        let message = match self {
            Self::InternalServerErrorWithContext(_) => Self::InternalServerError.to_string(),
            other => other.to_string(),
        };

        (
            status,
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}
