use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::protocol::{QueryResponse, ReturnCode};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classified failures of a registry query. Anything that is not one of
/// these travels as `anyhow::Error` until it is wrapped into `Grouping`.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidRequest(String),

    /// The registry could not be reached or did not answer usefully
    #[error("{message}")]
    Unavailable {
        code: ReturnCode,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    InstanceMapping {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Grouping {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl QueryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidRequest(message.into())
    }

    /// Registry answered with nothing; defaults to SERVICE_DOWN
    pub fn unavailable(message: impl Into<String>) -> Self {
        QueryError::Unavailable {
            code: ReturnCode::ServiceDown,
            message: message.into(),
            source: None,
        }
    }

    pub fn grouping(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        QueryError::Grouping {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn return_code(&self) -> ReturnCode {
        match self {
            QueryError::InvalidRequest(_) => ReturnCode::InvalidRequest,
            QueryError::Unavailable { code, .. } => *code,
            QueryError::Timeout { .. } => ReturnCode::Timeout,
            QueryError::InstanceMapping { .. } => ReturnCode::InvalidRequest,
            QueryError::Grouping { .. } => ReturnCode::Unknown,
        }
    }

    /// Recover an already-classified error from `err`, or classify it
    /// with `fallback`. Classified errors are never wrapped twice.
    pub fn reclassify(err: anyhow::Error, fallback: impl FnOnce(anyhow::Error) -> QueryError) -> Self {
        match err.downcast::<QueryError>() {
            Ok(classified) => classified,
            Err(other) => fallback(other),
        }
    }

    /// Render as an error envelope for the given correlation id
    pub fn to_response(&self, transaction_id: &str) -> QueryResponse {
        QueryResponse::from_code(
            self.return_code(),
            Some(self.to_string()),
            transaction_id,
            0.0,
            None,
        )
    }
}

/// Error carried to the HTTP layer together with the request's
/// correlation id.
#[derive(Debug)]
pub struct ApiError {
    pub transaction_id: String,
    pub error: QueryError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error.return_code();
        let status = StatusCode::from_u16(code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.error.to_response(&self.transaction_id))).into_response()
    }
}
