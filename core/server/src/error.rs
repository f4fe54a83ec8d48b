use relation_memory_schemas::ErrorBody;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the service. Each kind has a stable code and HTTP status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{reason}")]
    MissingRequiredField { reason: String },

    #[error("{reason}")]
    NotFound { reason: String, data: Option<Value> },

    #[error("{reason}")]
    AlreadyExists { reason: String, data: Option<Value> },

    #[error("{reason}")]
    Unauthorized { reason: String },

    #[error("{reason}")]
    InternalServerError { reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    pub fn missing_field(reason: impl Into<String>) -> Self {
        Error::MissingRequiredField {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Error::NotFound {
            reason: reason.into(),
            data: None,
        }
    }

    pub fn already_exists(reason: impl Into<String>, data: Option<Value>) -> Self {
        Error::AlreadyExists {
            reason: reason.into(),
            data,
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Error::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Error::InternalServerError {
            reason: reason.into(),
        }
    }

    /// Machine-readable code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingRequiredField { .. } => "F001",
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::Unauthorized { .. } => "unauthorized",
            Error::InternalServerError { .. } => "S001",
            Error::Database(_) => "DB001",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Error::MissingRequiredField { .. } => 400,
            Error::NotFound { .. } => 404,
            Error::AlreadyExists { .. } => 409,
            Error::Unauthorized { .. } => 401,
            Error::InternalServerError { .. } | Error::Database(_) => 500,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Error::NotFound { data, .. } | Error::AlreadyExists { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error_code: self.code().to_string(),
            reason: self.to_string(),
            data: self.data().cloned(),
        }
    }
}
