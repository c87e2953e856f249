use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Post not found")]
    PostNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Parent comment not found")]
    ParentCommentNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database is not available")]
    StoreUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Data file error: {0}")]
    FileStoreError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn to_status_code(&self) -> u16 {
        match self {
            Self::PostNotFound | Self::CommentNotFound | Self::ParentCommentNotFound => 404,
            Self::Conflict(_) => 409,
            Self::InvalidCredentials | Self::Unauthorized(_) => 401,
            Self::ValidationError(_) => 400,
            Self::StoreUnavailable => 503,
            Self::DatabaseError(_) | Self::FileStoreError(_) | Self::InternalError(_) => 500,
        }
    }

    /// Not-found and validation errors are reported to the caller; everything
    /// else is a storage concern the services recover from locally.
    pub fn is_request_error(&self) -> bool {
        matches!(self.to_status_code(), 400 | 401 | 404 | 409)
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::PostNotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::StoreUnavailable
            }
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::FileStoreError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::FileStoreError(err.to_string())
    }
}
