//! HTTP surface tests for the trip router, exercised with oneshot
//! requests against in-memory stores.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use fareledger::persistence::local::LocalTripCache;
use fareledger::persistence::{
    LedgerError, PersistenceGateway, RewardLedger, StoreError, TripStore,
};
use fareledger::tracking::{
    trip_router, FixedCostProfile, FixedRate, RewardTransaction, TripApi, TripId, TripRecord,
    TripRecordDraft,
};

#[derive(Default)]
struct MemoryTripStore {
    records: Mutex<Vec<TripRecord>>,
    sequence: AtomicU64,
    fail: AtomicBool,
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn commit_trip(&self, draft: TripRecordDraft) -> Result<TripRecord, StoreError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(StoreError::Transport("store offline".to_string()));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record = draft.into_record(TripId(format!("trip-{id:06}")));
        self.records
            .lock()
            .expect("store mutex")
            .insert(0, record.clone());
        Ok(record)
    }

    async fn recent_trips(&self, limit: usize) -> Result<Vec<TripRecord>, StoreError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(StoreError::Transport("store offline".to_string()));
        }
        let records = self.records.lock().expect("store mutex");
        Ok(records.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
struct MemoryRewardLedger {
    entries: Mutex<Vec<RewardTransaction>>,
}

#[async_trait]
impl RewardLedger for MemoryRewardLedger {
    async fn commit_reward(
        &self,
        transaction: RewardTransaction,
    ) -> Result<RewardTransaction, LedgerError> {
        self.entries
            .lock()
            .expect("ledger mutex")
            .push(transaction.clone());
        Ok(transaction)
    }
}

fn cost_profile() -> FixedCostProfile {
    FixedCostProfile {
        maintenance_cost_per_interval: 500.0,
        maintenance_interval_km: 5000.0,
        insurance_monthly: 60.0,
        cellular_rent_monthly: 30.0,
        account_payment_monthly: None,
        fuel_consumption_per_100km: 8.0,
        fuel_price_per_liter: 0.85,
    }
}

fn build_router() -> axum::Router {
    let store = Arc::new(MemoryTripStore::default());
    let ledger = Arc::new(MemoryRewardLedger::default());
    let cache = Arc::new(LocalTripCache::in_memory());
    let gateway = PersistenceGateway::new(store, ledger, cache);
    let api = Arc::new(TripApi::new(
        gateway,
        Arc::new(FixedRate(0.8)),
        cost_profile(),
        Duration::from_secs(1),
    ));
    trip_router(api)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

#[tokio::test]
async fn starting_a_trip_returns_an_active_status() {
    let router = build_router();
    let response = router
        .oneshot(post_json(
            "/api/v1/trips",
            json!({ "platform": "uber", "fare_amount": 20.0 }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = json_body(response).await;
    assert_eq!(payload.get("state"), Some(&json!("active")));
    assert_eq!(payload.get("distance_km"), Some(&json!(0.0)));
}

#[tokio::test]
async fn zero_fare_is_rejected_with_unprocessable_entity() {
    let router = build_router();
    let response = router
        .oneshot(post_json(
            "/api/v1/trips",
            json!({ "platform": "uber", "fare_amount": 0.0 }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("fare"));
}

#[tokio::test]
async fn samples_require_a_tracked_trip() {
    let router = build_router();
    let response = router
        .oneshot(post_json(
            "/api/v1/trips/current/samples",
            json!({ "latitude": 41.2995, "longitude": 69.2401 }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn a_full_trip_round_trips_through_the_http_surface() {
    let router = build_router();

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/trips",
            json!({ "platform": "uber", "fare_amount": 20.0 }),
        ))
        .await
        .expect("start dispatch");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for (latitude, longitude) in [(41.2995, 69.2401), (41.3112, 69.2797), (41.3264, 69.3280)] {
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/v1/trips/current/samples",
                json!({ "latitude": latitude, "longitude": longitude }),
            ))
            .await
            .expect("sample dispatch");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    // The location feed is consumed by a background task; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/trips/current")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("status dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status.get("state"), Some(&json!("active")));
    assert_eq!(status.get("samples_recorded"), Some(&json!(3)));
    assert!(status.get("distance_km").and_then(Value::as_f64).unwrap() > 0.0);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/trips/current/stop",
            json!({ "route_snapshot_ref": "snapshots/route-9.png" }),
        ))
        .await
        .expect("stop dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let completion = json_body(response).await;

    let record = completion.get("record").expect("record present");
    assert_eq!(record.get("platform"), Some(&json!("uber")));
    assert_eq!(record.get("fare_amount"), Some(&json!(20.0)));
    assert_eq!(
        record.get("route_snapshot_ref"),
        Some(&json!("snapshots/route-9.png"))
    );
    assert!(completion.get("reward").is_some());
    assert_eq!(
        completion.get("warnings").and_then(Value::as_array).map(Vec::len),
        Some(0)
    );
    assert!(completion.get("net").and_then(Value::as_f64).is_some());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/trips?limit=5")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("history dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let history = json_body(response).await;
    assert_eq!(
        history.get("trips").and_then(Value::as_array).map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn cancel_returns_to_idle_and_stop_then_conflicts() {
    let router = build_router();

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/trips",
            json!({ "platform": "libre", "fare_amount": 12.0 }),
        ))
        .await
        .expect("start dispatch");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/trips/current/cancel", json!({})))
        .await
        .expect("cancel dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status.get("state"), Some(&json!("idle")));

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/trips/current/stop", json!({})))
        .await
        .expect("stop dispatch");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
