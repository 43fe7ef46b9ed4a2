use serde::{Deserialize, Serialize};

/// A named non-negative accumulator. A key that was never written reads as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub key: String,
    pub value: u64,
}
