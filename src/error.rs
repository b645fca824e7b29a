use crate::bootstrap::InitStage;
use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TodoError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to retrieve JWT token")]
    MissingAccessToken,

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Vault rejected secret `{name}` with status {status}")]
    VaultStatus { name: String, status: StatusCode },

    #[error("Vault secret `{0}` has no value")]
    EmptySecret(String),

    #[error("Cosmos account key is not valid base64: {0}")]
    InvalidMasterKey(#[from] base64::DecodeError),

    #[error("Cosmos {operation} failed with status {status}: {message}")]
    CosmosStatus {
        operation: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error(
        "Container `{container}` exists with partition key `{actual}`, expected `{expected}`"
    )]
    PartitionKeyMismatch {
        container: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Item `{0}` not found")]
    ItemNotFound(String),

    #[error("Startup failed while {stage}: {source}")]
    Startup {
        stage: InitStage,
        #[source]
        source: Box<TodoError>,
    },
}

impl From<figment::Error> for TodoError {
    fn from(e: figment::Error) -> Self {
        TodoError::Figment(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for TodoError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => TodoError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                TodoError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => TodoError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => TodoError::Oauth2Token(s),
        }
    }
}

/// Full error text, attached to error responses so the development
/// error page can show it. Production responses never render it.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl TodoError {
    /// The gateway answered 429; the only status worth another attempt.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            TodoError::CosmosStatus { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS
        )
    }

    fn status_and_body(&self) -> (StatusCode, ApiErrorBody) {
        match self {
            TodoError::ItemNotFound(_) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", "The requested item does not exist."),
            ),
            TodoError::InvalidItem(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("INVALID_ITEM", "The item failed validation."),
            ),
            TodoError::Json(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("BAD_REQUEST", "Malformed request payload."),
            ),
            e if e.is_throttled() => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorBody::new("THROTTLED", "The database is busy, try again later."),
            ),
            TodoError::Reqwest(_) | TodoError::CosmosStatus { .. } => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody::new("BAD_GATEWAY", "The database is unavailable."),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
            ),
        }
    }
}

impl IntoResponse for TodoError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = self.status_and_body();
        let mut resp = (status, Json(ApiErrorResponse { error: error_body })).into_response();
        resp.extensions_mut().insert(ErrorDetail(self.to_string()));
        resp
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
