use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Postgres error code for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    Query(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateEntry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DatabaseError::DuplicateEntry(db.message().to_string())
            }
            _ => DatabaseError::Query(err),
        }
    }
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }
}
