use crate::application::repos::RepoError;
use crate::cache::RetryClassify;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates foreign key constraint") => {
            RepoError::ForeignKey {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("invalid input syntax") => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

impl RetryClassify for sqlx::Error {
    /// Constraint violations and malformed input fail the same way on every attempt.
    fn is_retryable(&self) -> bool {
        match self {
            sqlx::Error::Database(db) => {
                let message = db.message();
                !(message.contains("violates") || message.contains("invalid input syntax"))
            }
            sqlx::Error::RowNotFound
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => false,
            _ => true,
        }
    }
}

/// Postgres has no unsigned integers; page sizes are bound as BIGINT.
pub(super) fn bind_limit(value: u32) -> i64 {
    i64::from(value)
}
