use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use derive_new::new;
use serde::Deserialize;
use serde_json::json;
use snafu::ResultExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::config::Config;
use crate::error::{ApplicationError, BindAddressSnafu, InvalidOriginSnafu, WebServerSnafu};
use crate::model::{Analytics, ClickEvent, Counter, LeaderboardEntry, NewClick};
use crate::store::Store;

pub use error::{ApiError, Result};
pub use rate_limit::RateLimiter;

use error::invalid_argument;

mod error;
mod rate_limit;

const MAX_SUBJECT_LENGTH: usize = 255;
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Shared handler state: the injected store and the request throttle.
#[derive(Clone, new)]
pub struct App {
    pub store: Arc<dyn Store>,
    pub limiter: Arc<RateLimiter>,
}

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/count/:key",
            get(get_count).put(set_count).delete(reset_count),
        )
        .route("/count/:key/increment", post(increment_count))
        .route("/counts", get(list_counts))
        .route("/log-click", post(log_click))
        .route("/leaderboard", get(leaderboard))
        .route("/analytics/:subject", get(analytics))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(app.clone(), throttle))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Binds the configured address and serves the router until shutdown.
pub async fn serve(app: App, config: &Config) -> Result<(), ApplicationError> {
    let router = create_router(app).layer(cors_layer(config)?);

    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu {
            address: config.host,
        })?;

    tracing::info!(address = %config.host, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context(WebServerSnafu)
}

/// Permissive CORS unless an origin allowlist is configured. An entry that
/// does not parse is a startup error, not a silently narrowed allowlist.
fn cors_layer(config: &Config) -> Result<CorsLayer, ApplicationError> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match &config.allowed_origins {
        None => Ok(cors.allow_origin(Any)),
        Some(origins) => {
            let origins = origins
                .iter()
                .map(|origin| {
                    origin
                        .parse::<HeaderValue>()
                        .context(InvalidOriginSnafu { origin })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(cors.allow_origin(origins))
        }
    }
}

/// `Json` with rejections mapped to 400, so a malformed body reads as
/// `InvalidArgument` like every other bad input.
#[derive(Debug)]
struct JsonBody<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| invalid_argument(rejection.body_text()))?;

        Ok(JsonBody(value))
    }
}

/// Caller address: first hop of `X-Forwarded-For` when present, otherwise the
/// socket address.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub IpAddr);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse().ok());

        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientAddr(
            forwarded
                .or(socket)
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ))
    }
}

async fn throttle(
    State(app): State<App>,
    ClientAddr(addr): ClientAddr,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !app.limiter.check(addr) {
        tracing::warn!(%addr, "request budget exceeded");
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip(app))]
async fn get_count(State(app): State<App>, Path(key): Path<String>) -> Result<Json<Counter>> {
    let value = app.store.get(&key).await?;
    Ok(Json(Counter { key, value }))
}

#[instrument(skip(app))]
async fn increment_count(
    State(app): State<App>,
    Path(key): Path<String>,
) -> Result<Json<Counter>> {
    let value = app.store.increment(&key).await?;
    Ok(Json(Counter { key, value }))
}

#[derive(Debug, Deserialize)]
struct SetCount {
    value: i64,
}

#[instrument(skip(app))]
async fn set_count(
    State(app): State<App>,
    Path(key): Path<String>,
    JsonBody(body): JsonBody<SetCount>,
) -> Result<Json<Counter>> {
    let value = u64::try_from(body.value)
        .map_err(|_| invalid_argument("value must be a non-negative integer"))?;

    let value = app.store.set(&key, value).await?;
    Ok(Json(Counter { key, value }))
}

#[instrument(skip(app))]
async fn reset_count(State(app): State<App>, Path(key): Path<String>) -> Result<Json<Counter>> {
    let value = app.store.reset(&key).await?;
    Ok(Json(Counter { key, value }))
}

#[instrument(skip(app))]
async fn list_counts(State(app): State<App>) -> Result<Json<BTreeMap<String, u64>>> {
    Ok(Json(app.store.list_all().await?))
}

#[derive(Debug, Deserialize)]
struct LogClick {
    #[serde(alias = "cardTitle")]
    subject: String,
}

#[instrument(skip(app, headers))]
async fn log_click(
    State(app): State<App>,
    ClientAddr(addr): ClientAddr,
    headers: HeaderMap,
    JsonBody(body): JsonBody<LogClick>,
) -> Result<(StatusCode, Json<ClickEvent>)> {
    let subject = body.subject.trim();

    if subject.is_empty() {
        return Err(invalid_argument("subject must not be empty"));
    }

    if subject.chars().count() > MAX_SUBJECT_LENGTH {
        return Err(invalid_argument("subject must be at most 255 characters"));
    }

    let client = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let click = NewClick::new(subject.to_owned(), addr.to_string(), client);
    let event = app.store.record(click).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
    #[serde(rename = "minClicks")]
    min_clicks: Option<u64>,
}

#[instrument(skip(app))]
async fn leaderboard(
    State(app): State<App>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);
    let min_clicks = query.min_clicks.unwrap_or(1);

    Ok(Json(app.store.leaderboard(min_clicks, limit).await?))
}

#[instrument(skip(app))]
async fn analytics(
    State(app): State<App>,
    Path(subject): Path<String>,
) -> Result<Json<Analytics>> {
    Ok(Json(app.store.analytics(&subject).await?))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
