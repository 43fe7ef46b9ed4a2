use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use itertools::Itertools;

use super::{top_subjects, ClickStore, CounterStore, Result};
use crate::model::{Analytics, ClickEvent, LeaderboardEntry, NewClick};

/// In-process backend. Counters live in one concurrent map, clicks in an
/// append-only list per subject. Operations never fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    counters: Arc<DashMap<String, u64>>,
    clicks: Arc<DashMap<String, Vec<ClickEvent>>>,
    next_click_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<u64> {
        Ok(self.counters.get(key).map(|value| *value).unwrap_or(0))
    }

    async fn set(&self, key: &str, value: u64) -> Result<u64> {
        self.counters.insert(key.to_owned(), value);
        Ok(value)
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let mut entry = self.counters.entry(key.to_owned()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn reset(&self, key: &str) -> Result<u64> {
        self.counters.insert(key.to_owned(), 0);
        Ok(0)
    }

    async fn list_all(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect())
    }
}

#[async_trait]
impl ClickStore for MemoryStore {
    async fn record(&self, click: NewClick) -> Result<ClickEvent> {
        let id = self.next_click_id.fetch_add(1, Ordering::Relaxed) + 1;

        let event = ClickEvent {
            id: format!("clicks:{id}"),
            subject: click.subject.clone(),
            timestamp: click.timestamp,
            origin: click.origin,
            client: click.client,
        };

        self.clicks
            .entry(click.subject)
            .or_default()
            .push(event.clone());

        Ok(event)
    }

    async fn leaderboard(&self, min_clicks: u64, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let entries = self.clicks.iter().map(|entry| LeaderboardEntry {
            subject: entry.key().clone(),
            clicks: entry.value().len() as u64,
        });

        Ok(top_subjects(entries.collect_vec(), min_clicks, limit))
    }

    async fn analytics(&self, subject: &str) -> Result<Analytics> {
        let timestamps = self
            .clicks
            .get(subject)
            .map(|events| {
                events
                    .iter()
                    .map(|event| event.timestamp)
                    .sorted_by(|a, b| b.cmp(a))
                    .collect_vec()
            })
            .unwrap_or_default();

        Ok(Analytics::from_timestamps(subject, timestamps))
    }
}
