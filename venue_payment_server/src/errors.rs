use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use venue_payment_engine::{
    traits::{FeePolicyError, LedgerError},
    RefundError,
    WebhookApiError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Unsupported webhook provider: {0}")]
    UnknownProvider(String),
    #[error("Webhook signature rejected. {0}")]
    InvalidSignature(String),
    #[error("Operator authentication failed. {0}")]
    Unauthorized(String),
    #[error("The service is temporarily unavailable. {0}")]
    Unavailable(String),
    #[error("{0}")]
    RefundFailed(#[from] RefundError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::InvalidSignature(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RefundFailed(e) => match e {
                RefundError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                e if e.is_validation_error() => StatusCode::UNPROCESSABLE_ENTITY,
                RefundError::Processor(_) => StatusCode::BAD_GATEWAY,
                RefundError::Timeout | RefundError::RecordTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                RefundError::StatusSyncPending { .. } => StatusCode::ACCEPTED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<WebhookApiError> for ServerError {
    fn from(e: WebhookApiError) -> Self {
        match e {
            WebhookApiError::Parse(e) => Self::InvalidRequestBody(e.to_string()),
            WebhookApiError::GateUnavailable(e) => Self::Unavailable(e.to_string()),
            WebhookApiError::EventNotFound(id) => Self::NoRecordFound(format!("Webhook event {id}")),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(id) => Self::NoRecordFound(format!("Connected account {id}")),
            LedgerError::TransactionNotFound(id) => Self::NoRecordFound(format!("Transaction {id}")),
            LedgerError::QueryError(s) => Self::InvalidRequestBody(s),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<FeePolicyError> for ServerError {
    fn from(e: FeePolicyError) -> Self {
        match e {
            FeePolicyError::Unavailable(_) => Self::Unavailable(e.to_string()),
            FeePolicyError::InvalidSetting(_) => Self::BackendError(e.to_string()),
        }
    }
}
