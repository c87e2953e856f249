use crate::data::post_repository::{PostStore, PostgresPostStore};
use crate::domain::DomainError;
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;

/// Outcome of one best-effort write against a single store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum StoreWrite {
    Written,
    /// Nothing changed, so nothing was sent to the store.
    Skipped,
    Unavailable,
    Failed(String),
}

impl StoreWrite {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }

    /// The store holds what the cache holds: written, or nothing to write.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Written | Self::Skipped)
    }

    pub fn from_result<T>(result: Result<T, DomainError>) -> Self {
        match result {
            Ok(_) => Self::Written,
            Err(DomainError::StoreUnavailable) => Self::Unavailable,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Handle on the relational store that may have no connection at all.
///
/// `safe_query` is the degrade-gracefully path used by request handling:
/// nothing escapes it, failures are logged and turn into `None`. `execute`
/// propagates, for callers that must see failures (seeding, migrations).
#[derive(Clone)]
pub struct PrimaryStore {
    inner: Option<Arc<dyn PostStore>>,
}

impl PrimaryStore {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { inner: Some(store) }
    }

    pub fn unavailable() -> Self {
        Self { inner: None }
    }

    pub fn from_pool(pool: Option<PgPool>) -> Self {
        match pool {
            Some(pool) => Self::new(Arc::new(PostgresPostStore::new(pool))),
            None => Self::unavailable(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(Arc<dyn PostStore>) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let store = self.inner.clone().ok_or(DomainError::StoreUnavailable)?;
        tracing::debug!("Database operation: {}", operation);
        f(store).await
    }

    pub async fn safe_query<T, F, Fut>(&self, operation: &str, f: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn PostStore>) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        match self.execute(operation, f).await {
            Ok(value) => Some(value),
            Err(DomainError::StoreUnavailable) => {
                tracing::warn!(
                    "No database connection available - skipping {}",
                    operation
                );
                None
            }
            Err(e) => {
                tracing::error!("Error executing database operation {}: {}", operation, e);
                None
            }
        }
    }

    /// Runs a write and records how it went instead of failing the caller.
    pub async fn write<F, Fut>(&self, operation: &str, f: F) -> StoreWrite
    where
        F: FnOnce(Arc<dyn PostStore>) -> Fut,
        Fut: Future<Output = Result<(), DomainError>>,
    {
        let outcome = StoreWrite::from_result(self.execute(operation, f).await);
        match &outcome {
            StoreWrite::Written | StoreWrite::Skipped => {
                tracing::debug!("Database write {} succeeded", operation)
            }
            StoreWrite::Unavailable => tracing::warn!(
                "No database connection available - {} kept in memory and file only",
                operation
            ),
            StoreWrite::Failed(reason) => {
                tracing::error!("Database write {} failed: {}", operation, reason)
            }
        }
        outcome
    }
}
