/// Failures raised by the store, integrity, marks and calc layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Wire code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Db(_) => "db_error",
        }
    }
}

/// Maps a UNIQUE violation to `Conflict`, leaving other database errors intact.
pub fn conflict_on_unique(e: rusqlite::Error, message: &str) -> CoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            CoreError::conflict(message)
        }
        _ => CoreError::Db(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(CoreError::validation("x").code(), "validation_error");
        assert_eq!(CoreError::not_found("x").code(), "not_found");
        assert_eq!(CoreError::conflict("x").code(), "conflict");
        assert_eq!(
            CoreError::from(rusqlite::Error::InvalidQuery).code(),
            "db_error"
        );
    }
}
