use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(coachdesk_database::DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<coachdesk_database::DatabaseError> for AuthError {
    fn from(err: coachdesk_database::DatabaseError) -> Self {
        use coachdesk_database::DatabaseError;
        match err {
            DatabaseError::NotFound(msg) => AuthError::NotFound(msg),
            DatabaseError::InvalidInput(msg) => AuthError::InvalidInput(msg),
            other => AuthError::DatabaseError(other),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::ValidationError(err.to_string())
    }
}
