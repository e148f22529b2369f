//! Store errors and their mapping onto domain errors.

use dg_core::error::DomainError;

/// Errors raised by the `PostgreSQL` store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A column held a value the domain cannot read.
    #[error("column {column} holds an unreadable value: {value}")]
    Corrupt {
        /// `table.column`.
        column: &'static str,
        /// The raw value.
        value: String,
    },
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                DomainError::Conflict(db.message().to_owned())
            }
            StoreError::Database(sqlx::Error::Database(db)) if db.is_check_violation() => {
                DomainError::Validation(db.message().to_owned())
            }
            other => DomainError::Infrastructure(other.to_string()),
        }
    }
}

pub(crate) fn db(err: sqlx::Error) -> DomainError {
    StoreError::from(err).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_infrastructure() {
        let err: DomainError = StoreError::Database(sqlx::Error::PoolTimedOut).into();

        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_corrupt_column_is_infrastructure() {
        let err: DomainError = StoreError::Corrupt {
            column: "games.status",
            value: "lost".to_owned(),
        }
        .into();

        assert!(matches!(err, DomainError::Infrastructure(msg) if msg.contains("games.status")));
    }
}
