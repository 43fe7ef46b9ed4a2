use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{now, Timestamp};

/// How many of the latest click timestamps an analytics response carries.
pub const RECENT_TIMESTAMPS: usize = 10;

/// A click that has not been recorded yet; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
pub struct NewClick {
    pub subject: String,
    #[new(value = "now()")]
    pub timestamp: Timestamp,
    pub origin: String,
    pub client: Option<String>,
}

/// An immutable record of one interaction with a named subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: String,
    pub subject: String,
    pub timestamp: Timestamp,
    pub origin: String,
    pub client: Option<String>,
}

/// Per-subject click total, one leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub subject: String,
    pub clicks: u64,
}

/// Aggregate view over the clicks recorded for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Analytics {
    pub subject: String,
    pub total: u64,
    pub recent: Vec<Timestamp>,
    pub first: Option<Timestamp>,
    pub last: Option<Timestamp>,
}

impl Analytics {
    /// Builds the aggregate view from timestamps sorted newest first.
    pub fn from_timestamps(subject: &str, timestamps: Vec<Timestamp>) -> Self {
        Analytics {
            subject: subject.to_owned(),
            total: timestamps.len() as u64,
            first: timestamps.last().copied(),
            last: timestamps.first().copied(),
            recent: timestamps.into_iter().take(RECENT_TIMESTAMPS).collect(),
        }
    }
}
