use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use snafu::ResultExt;

use crate::config::{Config, StoreBackend};
use crate::error::{ApplicationError, ConnectStoreSnafu};
use crate::model::{Analytics, ClickEvent, LeaderboardEntry, NewClick};

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use remote::RemoteStore;

mod error;
pub(crate) mod fallback;
mod memory;
mod remote;

/// Adapter over "get/set/increment/reset a named counter", backed by either
/// an in-process map or a remote table. A key that was never written reads
/// as 0.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<u64>;

    /// Overwrites the counter, creating it when absent, and returns the
    /// stored value.
    async fn set(&self, key: &str, value: u64) -> Result<u64>;

    /// Increases the counter by one, creating it with 1 when absent, and
    /// returns the new value.
    async fn increment(&self, key: &str) -> Result<u64>;

    async fn reset(&self, key: &str) -> Result<u64>;

    /// Snapshot of every known counter.
    async fn list_all(&self) -> Result<BTreeMap<String, u64>>;
}

/// Append-only click event log with its aggregated views.
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// Records one click and returns the created record.
    async fn record(&self, click: NewClick) -> Result<ClickEvent>;

    /// Per-subject click totals with at least `min_clicks`, descending by
    /// count, at most `limit` rows.
    async fn leaderboard(&self, min_clicks: u64, limit: usize) -> Result<Vec<LeaderboardEntry>>;

    async fn analytics(&self, subject: &str) -> Result<Analytics>;
}

/// Everything the HTTP surface needs from a backend.
pub trait Store: CounterStore + ClickStore {}

impl<T: CounterStore + ClickStore> Store for T {}

/// Builds the backend selected by the configuration.
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, ApplicationError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Remote => {
            let store = RemoteStore::connect(config.remote()?)
                .await
                .context(ConnectStoreSnafu)?;
            Ok(Arc::new(store))
        }
    }
}

/// Shared leaderboard shaping: filter by minimum count, order by count
/// descending (subject as tie break), cap the result size.
pub(crate) fn top_subjects(
    entries: impl IntoIterator<Item = LeaderboardEntry>,
    min_clicks: u64,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.clicks >= min_clicks)
        .sorted_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.subject.cmp(&b.subject)))
        .take(limit)
        .collect()
}
