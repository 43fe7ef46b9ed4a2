use snafu::Snafu;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failures of the backing store. The in-process backend never produces one;
/// the remote backend surfaces network, auth, and query problems here instead
/// of swallowing them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("Failed to connect to the store `{url}`: {source}"))]
    Connection { url: String, source: surrealdb::Error },

    #[snafu(display("Failed to query the store: {source}"))]
    Query { source: surrealdb::Error },

    #[snafu(display("Failed to deserialize the store response: {source}"))]
    Deserialize { source: surrealdb::Error },

    #[snafu(display("Store returned an empty response"))]
    EmptyResponse,
}

/// Helper for raising a store-side error with a message.
#[cfg(test)]
pub(crate) fn throw(msg: impl std::fmt::Display) -> StoreError {
    StoreError::Query {
        source: surrealdb::error::Db::Thrown(msg.to_string()).into(),
    }
}
