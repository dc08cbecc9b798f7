use serde::Serialize;
use crate::types::GroupedView;

/// API path of the grouped query endpoint
pub const APPS_PATH: &str = "/cdi-eureka-service/v1/eureka/apps";

/// Registry sub-path appended to the Eureka base URL
pub const REGISTRY_APPS_SUFFIX: &str = "/apps";

/// Request/response header carrying the correlation id
pub const TRANSACTION_ID_HEADER: &str = "x-transaction-id";

/// Which group of HTTP statuses a return code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    Success,
    ClientError,
    ServerError,
}

/// Stable machine-readable result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success,
    InvalidRequest,
    InvalidToken,
    AuthRequired,
    AccessDenied,
    ServiceDown,
    Timeout,
    Unknown,
    InvalidHost,
    ServiceUnavailable,
}

impl ReturnCode {
    pub fn code(self) -> &'static str {
        match self {
            ReturnCode::Success => "SUCCESS",
            ReturnCode::InvalidRequest => "INVALID_REQUEST",
            ReturnCode::InvalidToken => "INVALID_TOKEN",
            ReturnCode::AuthRequired => "AUTH_REQUIRED",
            ReturnCode::AccessDenied => "ACCESS_DENIED",
            ReturnCode::ServiceDown => "SERVICE_DOWN",
            ReturnCode::Timeout => "TIMEOUT",
            ReturnCode::Unknown => "UNKNOWN",
            ReturnCode::InvalidHost => "INVALID_HOST",
            ReturnCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Default human-readable message
    pub fn message(self) -> &'static str {
        match self {
            ReturnCode::Success => "Request completed successfully.",
            ReturnCode::InvalidRequest => "The query is badly formatted (e.g., missing fields).",
            ReturnCode::InvalidToken => "The provided JWT token is invalid or expired.",
            ReturnCode::AuthRequired => "Authentication to server failed.",
            ReturnCode::AccessDenied => "Credentials were valid but action was not permitted.",
            ReturnCode::ServiceDown => "The system is currently unavailable.",
            ReturnCode::Timeout => "The operation took too long and was aborted.",
            ReturnCode::Unknown => "An unexpected or unclassified internal error happened.",
            ReturnCode::InvalidHost => "The provided hostname could not be resolved.",
            ReturnCode::ServiceUnavailable => {
                "The requested service is currently not responding. Try again in a few moments."
            }
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            ReturnCode::Success => 200,
            ReturnCode::InvalidRequest | ReturnCode::InvalidToken | ReturnCode::InvalidHost => 400,
            ReturnCode::AuthRequired => 401,
            ReturnCode::AccessDenied => 403,
            ReturnCode::Unknown => 500,
            ReturnCode::ServiceDown => 502,
            ReturnCode::ServiceUnavailable => 503,
            ReturnCode::Timeout => 504,
        }
    }

    pub fn family(self) -> StatusFamily {
        match self.http_status() {
            200..=299 => StatusFamily::Success,
            400..=499 => StatusFamily::ClientError,
            _ => StatusFamily::ServerError,
        }
    }
}

/// Uniform response envelope. The grouped payload is merged into the
/// envelope's own fields rather than nested under a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub return_code: String,
    pub message: String,
    pub http_status_code: u16,
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    /// Milliseconds, fractional
    pub elapsed_time: f64,
    #[serde(flatten)]
    pub data: Option<GroupedView>,
}

impl QueryResponse {
    pub fn from_code(
        code: ReturnCode,
        message: Option<String>,
        transaction_id: impl Into<String>,
        elapsed_time: f64,
        data: Option<GroupedView>,
    ) -> Self {
        Self {
            return_code: code.code().to_string(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            http_status_code: code.http_status(),
            transaction_id: transaction_id.into(),
            elapsed_time,
            data,
        }
    }

    pub fn success(transaction_id: impl Into<String>, elapsed_time: f64, data: GroupedView) -> Self {
        Self::from_code(ReturnCode::Success, None, transaction_id, elapsed_time, Some(data))
    }
}
