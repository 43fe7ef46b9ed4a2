use std::sync::Arc;

use dotenvy::dotenv;

use tally::api::{self, App, RateLimiter};
use tally::config::Config;
use tally::error::ApplicationError;
use tally::{logger, store};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::load()?;

    let _guard = logger::init(&config)?;

    let store = store::connect(&config).await?;
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window(),
    ));

    api::serve(App::new(store, limiter), &config).await
}
