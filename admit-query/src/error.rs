//! Error types for the query crate.

/// Errors raised by the backing store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Could not connect at startup.
    #[error("store connection failed: {0}")]
    Connect(String),

    /// The store rejected or failed the query. Carries the store's own text.
    #[error("{0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => Self::Query(db.message().to_owned()),
            other => Self::Query(other.to_string()),
        }
    }
}

/// Errors building or running the query service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The statement template has no `{sql}` placeholder.
    #[error("query template must contain {{sql}} exactly once: {0:?}")]
    InvalidTemplate(String),

    /// Store failure outside of a single query.
    #[error(transparent)]
    Store(#[from] StoreError),
}
