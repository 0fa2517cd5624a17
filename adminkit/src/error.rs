use crate::form::FormErrors;
use crate::identifier::IdentifierError;
use crate::pagination::PaginationError;
use crate::value::ValueError;
use axum::extract::rejection::JsonRejection;
use http::StatusCode;
use std::sync::PoisonError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum AdminError {

    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid view configuration: {0}")]
    InvalidView(String),

    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json rejection: {0}")]
    JsonRejection(#[from] JsonRejection),

    #[error("Join: {0}")]
    JoinError(#[from] JoinError),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminError::NotFound(_)      => StatusCode::NOT_FOUND,
            AdminError::BadRequest(_)    => StatusCode::BAD_REQUEST,
            AdminError::Identifier(_)    => StatusCode::BAD_REQUEST,
            AdminError::Value(_)         => StatusCode::BAD_REQUEST,
            AdminError::Forbidden(_)     => StatusCode::FORBIDDEN,
            AdminError::Conflict(_)      => StatusCode::CONFLICT,
            AdminError::Validation(_)    => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::JsonRejection(r) => r.status(),
            _                            => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AdminError::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdminError::BadRequest(msg.into())
    }
}

impl<T> From<PoisonError<T>> for AdminError
{
    fn from(e: PoisonError<T>) -> Self {
        AdminError::Custom(format!("Poison error: {:?}", e.to_string()))
    }
}

impl From<AdminError> for axum::Error {
    fn from(val: AdminError) -> Self {
        axum::Error::new(val.to_string())
    }
}
