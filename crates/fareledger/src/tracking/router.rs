use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::costs::{FixedCostProfile, Platform};
use super::geo::GeoSample;
use super::lifecycle::{LifecycleError, TripLifecycle, TripStatus};
use super::record::round2;
use super::reward::RewardRateSource;
use super::runner::{spawn_tracker, SampleFeed};
use crate::persistence::{PersistenceGateway, RewardLedger, TripStore};

/// Shared state behind the trip endpoints: the lifecycle machine, a
/// gateway handle for history reads, and the feed of the trip currently
/// being sampled.
pub struct TripApi<S, L, R> {
    lifecycle: Arc<Mutex<TripLifecycle<S, L, R>>>,
    gateway: PersistenceGateway<S, L>,
    feed: Mutex<Option<SampleFeed>>,
    tick_interval: Duration,
}

impl<S, L, R> TripApi<S, L, R>
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    pub fn new(
        gateway: PersistenceGateway<S, L>,
        rates: Arc<R>,
        profile: FixedCostProfile,
        tick_interval: Duration,
    ) -> Self {
        let lifecycle = Arc::new(Mutex::new(TripLifecycle::new(
            gateway.clone(),
            rates,
            profile,
        )));
        Self {
            lifecycle,
            gateway,
            feed: Mutex::new(None),
            tick_interval,
        }
    }

    pub fn lifecycle(&self) -> Arc<Mutex<TripLifecycle<S, L, R>>> {
        self.lifecycle.clone()
    }
}

/// Router builder exposing the live trip-tracking endpoints.
pub fn trip_router<S, L, R>(api: Arc<TripApi<S, L, R>>) -> Router
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    Router::new()
        .route(
            "/api/v1/trips",
            post(start_handler::<S, L, R>).get(history_handler::<S, L, R>),
        )
        .route("/api/v1/trips/current", get(status_handler::<S, L, R>))
        .route(
            "/api/v1/trips/current/samples",
            post(sample_handler::<S, L, R>),
        )
        .route("/api/v1/trips/current/stop", post(stop_handler::<S, L, R>))
        .route(
            "/api/v1/trips/current/cancel",
            post(cancel_handler::<S, L, R>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartTripRequest {
    pub(crate) platform: Platform,
    pub(crate) fare_amount: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SampleRequest {
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    #[serde(default)]
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StopTripRequest {
    #[serde(default)]
    pub(crate) route_snapshot_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub(crate) limit: usize,
}

fn default_history_limit() -> usize {
    20
}

fn lifecycle_error_response(error: LifecycleError) -> Response {
    let status = match error {
        LifecycleError::InvalidFare => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

pub(crate) async fn start_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
    Json(request): Json<StartTripRequest>,
) -> Response
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let mut lifecycle = api.lifecycle.lock().await;

    if let Err(error) = lifecycle.new_trip() {
        return lifecycle_error_response(error);
    }
    if let Err(error) = lifecycle
        .start(request.platform, request.fare_amount, Utc::now())
        .await
    {
        return lifecycle_error_response(error);
    }

    let (feed, guard) = spawn_tracker(api.lifecycle.clone(), api.tick_interval);
    lifecycle.attach_tracker(guard);
    *api.feed.lock().await = Some(feed);

    (StatusCode::ACCEPTED, Json(lifecycle.status())).into_response()
}

pub(crate) async fn sample_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
    Json(request): Json<SampleRequest>,
) -> Response
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let sample = GeoSample {
        latitude: request.latitude,
        longitude: request.longitude,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };

    let feed = api.feed.lock().await;
    if let Some(feed) = feed.as_ref() {
        if feed.send(sample).await.is_ok() {
            return StatusCode::ACCEPTED.into_response();
        }
    }

    (
        StatusCode::CONFLICT,
        Json(json!({ "error": "no trip is currently being tracked" })),
    )
        .into_response()
}

pub(crate) async fn status_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
) -> Json<TripStatus>
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    Json(api.lifecycle.lock().await.status())
}

pub(crate) async fn stop_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
    request: Option<Json<StopTripRequest>>,
) -> Response
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let Json(request) = request.unwrap_or_default();

    // Transition and draft under the lock; commit outside it so a new
    // trip can start while this one's persistence is still resolving.
    let pending = {
        let mut lifecycle = api.lifecycle.lock().await;
        if let Err(error) = lifecycle.stop(Utc::now()) {
            return lifecycle_error_response(error);
        }
        api.feed.lock().await.take();
        match lifecycle.finalize(request.route_snapshot_ref) {
            Ok(pending) => pending,
            Err(error) => return lifecycle_error_response(error),
        }
    };

    let outcome = pending.commit().await;
    let net = round2(outcome.record.net());
    (
        StatusCode::OK,
        Json(json!({
            "record": outcome.record,
            "reward": outcome.reward,
            "warnings": outcome.warnings,
            "net": net,
        })),
    )
        .into_response()
}

pub(crate) async fn cancel_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
) -> Json<TripStatus>
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let mut lifecycle = api.lifecycle.lock().await;
    lifecycle.cancel();
    api.feed.lock().await.take();
    Json(lifecycle.status())
}

pub(crate) async fn history_handler<S, L, R>(
    State(api): State<Arc<TripApi<S, L, R>>>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let trips = api.gateway.history(query.limit).await;
    (StatusCode::OK, Json(json!({ "trips": trips }))).into_response()
}
