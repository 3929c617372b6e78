use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use apg_common::Money;
use arena_payment_engine::{MatchFlowError, WalletApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
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
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("The request conflicts with the current state. {0}")]
    StateConflict(String),
    #[error("Insufficient balance. Required {required}, available {available}")]
    InsufficientBalance { required: Money, available: Money },
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::StateConflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Insufficient balance carries the shortfall so clients can prompt a top-up with exact numbers.
        let body = match self {
            Self::InsufficientBalance { required, available } => serde_json::json!({
                "error": self.to_string(),
                "required": required,
                "available": available,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<WalletApiError> for ServerError {
    fn from(e: WalletApiError) -> Self {
        match e {
            WalletApiError::InsufficientBalance { required, available } => {
                Self::InsufficientBalance { required, available }
            },
            WalletApiError::WalletNotFound(_) | WalletApiError::UserHasNoWallet(_) | WalletApiError::DepositNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            WalletApiError::InvalidAmount(_) => Self::InvalidRequest(e.to_string()),
            WalletApiError::WalletClosed(_) | WalletApiError::DepositAmountMismatch { .. } => {
                Self::StateConflict(e.to_string())
            },
            WalletApiError::Conflict(_) => Self::StateConflict(e.to_string()),
            WalletApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<MatchFlowError> for ServerError {
    fn from(e: MatchFlowError) -> Self {
        match e {
            MatchFlowError::MatchNotFound(_) | MatchFlowError::NoWallet(_) => Self::NoRecordFound(e.to_string()),
            MatchFlowError::InvalidState { .. }
            | MatchFlowError::MatchFull(_)
            | MatchFlowError::AlreadyRegistered { .. }
            | MatchFlowError::NotRegistered { .. }
            | MatchFlowError::ResultsAlreadyUploaded(_)
            | MatchFlowError::PrizeExceedsPool { .. } => Self::StateConflict(e.to_string()),
            MatchFlowError::InvalidMatchDefinition(_) | MatchFlowError::PrizeConfig(_) => {
                Self::InvalidRequest(e.to_string())
            },
            MatchFlowError::Wallet(inner) => Self::from(inner),
            MatchFlowError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
