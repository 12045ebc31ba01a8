use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::costs::{FixedCostProfile, Platform};
use super::geo::{DistanceAccumulator, GeoSample};
use super::reward;

/// Mutable in-memory state of the one trip currently being tracked.
///
/// Exists only between the start transition and finalize/cancel; every
/// field is reset by constructing a fresh session. The token identifies
/// this session in persistence requests so that a commit still in flight
/// when a new trip starts cannot be misattributed.
#[derive(Debug, Clone)]
pub struct TripSession {
    trip_token: Uuid,
    platform: Platform,
    fare_amount: f64,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    rate_per_km: f64,
    profile: FixedCostProfile,
    distance: DistanceAccumulator,
    accumulated_seconds: u64,
    reward_accrued: f64,
    dropped_samples: u64,
}

impl TripSession {
    pub fn new(
        platform: Platform,
        fare_amount: f64,
        profile: FixedCostProfile,
        rate_per_km: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trip_token: Uuid::new_v4(),
            platform,
            fare_amount,
            started_at,
            ended_at: None,
            rate_per_km,
            profile,
            distance: DistanceAccumulator::default(),
            accumulated_seconds: 0,
            reward_accrued: 0.0,
            dropped_samples: 0,
        }
    }

    /// Fold a validated sample into the running totals. The reward is
    /// recomputed from the cumulative distance, not incremented, so
    /// per-sample rounding cannot drift.
    pub fn record_sample(&mut self, sample: GeoSample) -> f64 {
        let increment = self.distance.record(sample);
        self.reward_accrued = reward::accrued(self.distance.total_km(), self.rate_per_km);
        increment
    }

    pub fn record_tick(&mut self, seconds: u64) {
        self.accumulated_seconds += seconds;
    }

    pub fn note_dropped_sample(&mut self) {
        self.dropped_samples += 1;
    }

    pub fn mark_ended(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
    }

    pub fn trip_token(&self) -> Uuid {
        self.trip_token
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn fare_amount(&self) -> f64 {
        self.fare_amount
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn rate_per_km(&self) -> f64 {
        self.rate_per_km
    }

    pub fn profile(&self) -> &FixedCostProfile {
        &self.profile
    }

    pub fn distance_km(&self) -> f64 {
        self.distance.total_km()
    }

    pub fn route(&self) -> &[GeoSample] {
        self.distance.route()
    }

    pub fn sample_count(&self) -> usize {
        self.distance.sample_count()
    }

    pub fn accumulated_seconds(&self) -> u64 {
        self.accumulated_seconds
    }

    pub fn reward_accrued(&self) -> f64 {
        self.reward_accrued
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}
