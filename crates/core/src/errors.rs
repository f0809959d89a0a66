use thiserror::Error;

use crate::domain::profile::ProfileError;

pub const INTERNAL_ERROR_FALLBACK: &str = "Internal Server Error";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("authorization header is missing")]
    MissingCredentials,
    #[error("credentials were rejected: {0}")]
    InvalidCredentials(String),
    #[error("chat quota exhausted")]
    QuotaExceeded,
    #[error("quota lookup failed: {0}")]
    QuotaUnavailable(String),
    #[error("request validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    Integration(String),
}

/// Errors as the chat endpoint reports them to clients.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: &'static str, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("too many requests: {message}")]
    TooManyRequests { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated { .. } => 401,
            Self::BadRequest { .. } => 400,
            Self::TooManyRequests { .. } => 429,
            Self::Internal { .. } => 500,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated { message, .. } => (*message).to_string(),
            Self::BadRequest { .. } => "Invalid request".to_string(),
            Self::TooManyRequests { .. } => "Limit hit".to_string(),
            Self::Internal { message, .. } if message.trim().is_empty() => {
                INTERNAL_ERROR_FALLBACK.to_string()
            }
            Self::Internal { message, .. } => message.clone(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthenticated { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::TooManyRequests { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unauthenticated { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::TooManyRequests { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::MissingCredentials => {
                Self::Unauthenticated { message: "No auth", correlation_id }
            }
            ApplicationError::InvalidCredentials(_) => {
                Self::Unauthenticated { message: "Unauthorized", correlation_id }
            }
            ApplicationError::QuotaExceeded => {
                Self::TooManyRequests { message: "quota exhausted".to_owned(), correlation_id }
            }
            ApplicationError::QuotaUnavailable(message) => {
                Self::TooManyRequests { message, correlation_id }
            }
            ApplicationError::Validation(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Domain(DomainError::Profile(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Integration(message) => Self::Internal { message, correlation_id },
        }
    }
}
