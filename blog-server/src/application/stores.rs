use crate::data::{JsonFileStore, PostCache, PrimaryStore, StoreWrite};
use serde::Serialize;

/// The three places posts live: the cache every request reads, the primary
/// database, and the JSON file mirror. Services share one instance.
#[derive(Clone)]
pub struct Stores {
    pub cache: PostCache,
    pub primary: PrimaryStore,
    pub file: JsonFileStore,
}

impl Stores {
    pub fn new(cache: PostCache, primary: PrimaryStore, file: JsonFileStore) -> Self {
        Self {
            cache,
            primary,
            file,
        }
    }

    /// Mirrors the current cache into the JSON file.
    pub async fn save_file(&self, operation: &str) -> StoreWrite {
        let posts = self.cache.snapshot().await;
        match self.file.write_all(&posts).await {
            Ok(()) => StoreWrite::Written,
            Err(e) => {
                tracing::error!(
                    "Failed to save {} posts to data file after {}: {}",
                    posts.len(),
                    operation,
                    e
                );
                StoreWrite::Failed(e.to_string())
            }
        }
    }
}

/// Where a cache mutation ended up. A failed store write does not fail the
/// request; the next sync heals the drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub primary: StoreWrite,
    pub secondary: StoreWrite,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.primary.is_settled() && self.secondary.is_settled()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Persisted<T> {
    pub value: T,
    pub persistence: PersistReport,
}

impl<T> Persisted<T> {
    pub fn new(value: T, primary: StoreWrite, secondary: StoreWrite, operation: &str) -> Self {
        let persistence = PersistReport { primary, secondary };
        if !persistence.is_complete() {
            tracing::warn!(
                "{} applied in memory with partial persistence: {:?}",
                operation,
                persistence
            );
        }
        Self { value, persistence }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
