use std::net::SocketAddr;

use snafu::{Location, Snafu};

use crate::store::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApplicationError {
    /// could not parse the environment configuration
    ConfigLoad {
        source: envy::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// STORE_BACKEND is `remote` but no SURREAL_URL was provided
    MissingRemoteConfig {
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not connect to the remote store
    ConnectStore {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    /// ALLOWED_ORIGINS contains an entry that is not a valid origin
    InvalidOrigin {
        origin: String,
        source: axum::http::header::InvalidHeaderValue,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not bind to the given address, check if it's already in use
    BindAddress {
        address: SocketAddr,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not serve the application
    WebServer {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },
}
