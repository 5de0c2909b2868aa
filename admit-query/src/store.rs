//! Store executor seam.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;

use crate::error::StoreError;

/// Default per-query deadline.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Rendering of a SQL `NULL` scalar.
pub const NULL_SCALAR: &str = "NULL";

/// Executes a statement and reports the first column of its first row.
///
/// # Cancel Safety
/// Dropping the future abandons the query; the connection goes back to the
/// pool or is closed by the driver.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// `Ok(None)` when the statement produced no rows.
    ///
    /// # Errors
    /// Returns [`StoreError::Query`] carrying the store's message.
    async fn first_scalar(&self, sql: &str) -> Result<Option<String>, StoreError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for std::sync::Arc<T> {
    async fn first_scalar(&self, sql: &str) -> Result<Option<String>, StoreError> {
        (**self).first_scalar(sql).await
    }
}

/// MySQL executor over an `sqlx` pool, using the text protocol.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl MySqlExecutor {
    /// Connect eagerly; an unreachable store is a startup failure.
    ///
    /// # Errors
    /// Returns [`StoreError::Connect`] if the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_QUERY_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the per-query deadline.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

fn first_column(row: &MySqlRow) -> Result<Option<String>, StoreError> {
    if row.is_empty() {
        return Ok(None);
    }
    // Text protocol: every column arrives as its textual form.
    let value: Option<String> = match row.try_get(0) {
        Ok(v) => v,
        Err(_) => row.try_get_unchecked(0)?,
    };
    Ok(Some(render_scalar(value)))
}

fn render_scalar(value: Option<String>) -> String {
    value.unwrap_or_else(|| NULL_SCALAR.to_owned())
}

/// `RawSql::fetch_one` reports an empty result as `RowNotFound`.
fn optional_row<T>(fetched: Result<T, sqlx::Error>) -> Result<Option<T>, StoreError> {
    match fetched {
        Ok(row) => Ok(Some(row)),
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn first_scalar(&self, sql: &str) -> Result<Option<String>, StoreError> {
        let fetch = sqlx::raw_sql(sql).fetch_one(&self.pool);
        let fetched = tokio::time::timeout(self.query_timeout, fetch)
            .await
            .map_err(|_| StoreError::Query("query timed out".to_owned()))?;
        match optional_row(fetched)? {
            Some(row) => first_column(&row),
            None => Ok(None),
        }
    }
}
