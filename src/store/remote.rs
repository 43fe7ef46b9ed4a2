use std::collections::BTreeMap;

use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::sql::Thing;
use surrealdb::Surreal;

use super::error::{ConnectionSnafu, DeserializeSnafu, EmptyResponseSnafu, QuerySnafu};
use super::fallback::{self, CounterRow, CounterRows};
use super::{top_subjects, ClickStore, CounterStore, Result};
use crate::config::RemoteConfig;
use crate::model::{Analytics, ClickEvent, Counter, LeaderboardEntry, NewClick, Timestamp};

/// Table and function definitions, applied on every connect. The definitions
/// are idempotent.
const SETUP: &str = include_str!("../../schema.surrealql");

/// Remote backend: one `counters` row per key, append-only `clicks` rows, and
/// a store-side `fn::bump_counter` function for the atomic increment path.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    database: Surreal<Any>,
}

impl RemoteStore {
    /// Connects, signs in when credentials are configured, and applies the
    /// schema.
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let url = config.url.as_str();

        let database = surrealdb::engine::any::connect(url)
            .await
            .context(ConnectionSnafu { url })?;

        if let Some(credentials) = &config.credentials {
            database
                .signin(auth::Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &credentials.username,
                    password: &credentials.password,
                })
                .await
                .context(ConnectionSnafu { url })?;
        }

        database
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .context(ConnectionSnafu { url })?;

        database
            .query(SETUP)
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        Ok(Self { database })
    }
}

#[async_trait]
impl CounterStore for RemoteStore {
    async fn get(&self, key: &str) -> Result<u64> {
        let mut response = self
            .database
            .query("SELECT VALUE value FROM counters WHERE key = $key")
            .bind(("key", key))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let values: Vec<u64> = response.take(0).context(DeserializeSnafu)?;
        Ok(values.first().copied().unwrap_or(0))
    }

    async fn set(&self, key: &str, value: u64) -> Result<u64> {
        let mut response = self
            .database
            .query("UPDATE counters SET value = $value, updated_at = time::now() WHERE key = $key RETURN AFTER")
            .bind(("key", key))
            .bind(("value", value))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let updated: Vec<CounterRow> = response.take(0).context(DeserializeSnafu)?;
        if updated.is_empty() {
            self.insert(key, value).await?;
        }

        Ok(value)
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        fallback::increment_with_fallback(self, key).await
    }

    async fn reset(&self, key: &str) -> Result<u64> {
        self.set(key, 0).await?;
        Ok(0)
    }

    async fn list_all(&self) -> Result<BTreeMap<String, u64>> {
        let mut response = self
            .database
            .query("SELECT key, value FROM counters")
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let counters: Vec<Counter> = response.take(0).context(DeserializeSnafu)?;
        Ok(counters
            .into_iter()
            .map(|counter| (counter.key, counter.value))
            .collect())
    }
}

#[async_trait]
impl CounterRows for RemoteStore {
    async fn atomic_increment(&self, key: &str) -> Result<u64> {
        let mut response = self
            .database
            .query("RETURN fn::bump_counter($key)")
            .bind(("key", key))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let value: Option<u64> = response.take(0).context(DeserializeSnafu)?;
        value.context(EmptyResponseSnafu)
    }

    async fn select(&self, key: &str) -> Result<Option<CounterRow>> {
        let mut response = self
            .database
            .query("SELECT id, value FROM counters WHERE key = $key")
            .bind(("key", key))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        response.take(0).context(DeserializeSnafu)
    }

    async fn insert(&self, key: &str, value: u64) -> Result<u64> {
        let mut response = self
            .database
            .query("CREATE counters SET key = $key, value = $value, updated_at = time::now()")
            .bind(("key", key))
            .bind(("value", value))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let created: Option<CounterRow> = response.take(0).context(DeserializeSnafu)?;
        created.map(|row| row.value).context(EmptyResponseSnafu)
    }

    async fn update(&self, row: &CounterRow, value: u64) -> Result<u64> {
        let mut response = self
            .database
            .query("UPDATE $id SET value = $value, updated_at = time::now() RETURN AFTER")
            .bind(("id", &row.id))
            .bind(("value", value))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let updated: Option<CounterRow> = response.take(0).context(DeserializeSnafu)?;
        updated.map(|row| row.value).context(EmptyResponseSnafu)
    }
}

/// `clicks` row as stored, before the record id is flattened to a string.
#[derive(Debug, Deserialize)]
struct ClickRow {
    id: Thing,
    subject: String,
    timestamp: Timestamp,
    origin: String,
    client: Option<String>,
}

impl From<ClickRow> for ClickEvent {
    fn from(row: ClickRow) -> Self {
        ClickEvent {
            id: row.id.to_string(),
            subject: row.subject,
            timestamp: row.timestamp,
            origin: row.origin,
            client: row.client,
        }
    }
}

#[async_trait]
impl ClickStore for RemoteStore {
    async fn record(&self, click: NewClick) -> Result<ClickEvent> {
        let mut response = self
            .database
            .query("CREATE clicks SET subject = $subject, timestamp = $timestamp, origin = $origin, client = $client")
            .bind(("subject", &click.subject))
            .bind(("timestamp", click.timestamp))
            .bind(("origin", &click.origin))
            .bind(("client", &click.client))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let created: Option<ClickRow> = response.take(0).context(DeserializeSnafu)?;
        created.map(ClickEvent::from).context(EmptyResponseSnafu)
    }

    async fn leaderboard(&self, min_clicks: u64, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut response = self
            .database
            .query("SELECT subject, count() AS clicks FROM clicks GROUP BY subject")
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let entries: Vec<LeaderboardEntry> = response.take(0).context(DeserializeSnafu)?;
        Ok(top_subjects(entries, min_clicks, limit))
    }

    async fn analytics(&self, subject: &str) -> Result<Analytics> {
        let mut response = self
            .database
            .query("SELECT VALUE timestamp FROM clicks WHERE subject = $subject")
            .bind(("subject", subject))
            .await
            .context(QuerySnafu)?
            .check()
            .context(QuerySnafu)?;

        let timestamps: Vec<Timestamp> = response.take(0).context(DeserializeSnafu)?;
        let timestamps = timestamps
            .into_iter()
            .sorted_by(|a, b| b.cmp(a))
            .collect_vec();

        Ok(Analytics::from_timestamps(subject, timestamps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;

    async fn store() -> RemoteStore {
        RemoteStore::connect(&RemoteConfig::in_memory())
            .await
            .expect("in-memory engine should connect")
    }

    fn click(subject: &str) -> NewClick {
        NewClick::new(subject.to_owned(), "127.0.0.1".to_owned(), None)
    }

    #[tokio::test]
    async fn increments_through_the_atomic_function() {
        let store = store().await;

        assert_eq!(store.increment("home").await.unwrap(), 1);
        assert_eq!(store.increment("home").await.unwrap(), 2);
        assert_eq!(store.increment("home").await.unwrap(), 3);
        assert_eq!(store.get("home").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn fallback_steps_agree_with_the_atomic_path() {
        let store = store().await;

        assert_eq!(store.select("x").await.unwrap(), None);
        assert_eq!(store.insert("x", 1).await.unwrap(), 1);

        let row = store.select("x").await.unwrap().expect("row was created");
        assert_eq!(row.value, 1);
        assert_eq!(store.update(&row, 2).await.unwrap(), 2);
        assert_eq!(store.get("x").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_upserts_and_reset_zeroes() {
        let store = store().await;

        assert_eq!(store.set("x", 7).await.unwrap(), 7);
        assert_eq!(store.set("x", 9).await.unwrap(), 9);
        assert_eq!(store.get("x").await.unwrap(), 9);
        assert_eq!(store.reset("x").await.unwrap(), 0);
        assert_eq!(store.get("x").await.unwrap(), 0);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.get("x"), Some(&0));
    }

    #[tokio::test]
    async fn clicks_aggregate_into_leaderboard_and_analytics() {
        let store = store().await;

        store.record(click("Ace")).await.unwrap();
        store.record(click("Ace")).await.unwrap();
        store.record(click("Jack")).await.unwrap();

        let board = store.leaderboard(2, 10).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].subject, "Ace");
        assert_eq!(board[0].clicks, 2);

        let analytics = store.analytics("Ace").await.unwrap();
        assert_eq!(analytics.total, 2);
        assert_eq!(analytics.recent.len(), 2);
        assert!(analytics.first <= analytics.last);
    }
}
