use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(i64),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("An active block already exists for key: {0}")]
    DuplicateActiveKey(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    /// True for the insert race on the (key, active) uniqueness constraint.
    ///
    /// The blocking engine treats this as recoverable: it retries the block
    /// as an escalation of the record the concurrent caller created.
    pub fn is_duplicate_active_key(&self) -> bool {
        matches!(self, Error::Storage(StorageError::DuplicateActiveKey(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotFound))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
