use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::sql::Thing;

use super::Result;

/// Row-level view of the remote counters table. The increment fallback is
/// written against this seam so the failure path can be exercised without a
/// live store.
#[async_trait]
pub(crate) trait CounterRows: Send + Sync {
    /// Single round trip that bumps the counter store-side and returns the
    /// new value.
    async fn atomic_increment(&self, key: &str) -> Result<u64>;

    /// Fetches the row for `key`, `None` when it does not exist.
    async fn select(&self, key: &str) -> Result<Option<CounterRow>>;

    /// Creates the row with the given value and returns it.
    async fn insert(&self, key: &str, value: u64) -> Result<u64>;

    /// Overwrites the row's value, stamping its last-modified time, and
    /// returns the new value.
    async fn update(&self, row: &CounterRow, value: u64) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct CounterRow {
    pub id: Thing,
    pub value: u64,
}

/// Increment with fallback semantics: try the store-side atomic bump first,
/// and when that call fails (function not defined, transient error) fall back
/// to read-then-write. The two fallback steps are not atomic; concurrent
/// increments of the same key can lose an update.
pub(crate) async fn increment_with_fallback<R: CounterRows>(rows: &R, key: &str) -> Result<u64> {
    match rows.atomic_increment(key).await {
        Ok(value) => return Ok(value),
        Err(error) => {
            tracing::debug!(key, %error, "atomic increment failed, taking the fallback path");
        }
    }

    match rows.select(key).await? {
        None => rows.insert(key, 1).await,
        Some(row) => rows.update(&row, row.value + 1).await,
    }
}
