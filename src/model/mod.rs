use chrono::Utc;

pub use click::*;
pub use counter::*;

mod click;
mod counter;

pub type Timestamp = chrono::DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}
