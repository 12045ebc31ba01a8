use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::costs::CostBreakdown;
use super::costs::Platform;

/// Identifier assigned by whichever store accepted the trip record; the
/// local cache issues `local-` prefixed ids when the remote is down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round to storage precision (4 decimals). Applied only when a record is
/// built at the persistence boundary, never inside accumulation.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Round to display precision for aggregate totals (2 decimals).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A finished trip's financial payload, ready for the commit protocol.
///
/// Carries the originating session's token so a late-resolving commit can
/// never be attributed to a trip started afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecordDraft {
    pub trip_token: Uuid,
    pub platform: Platform,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_km: f64,
    pub fare_amount: f64,
    pub commission: f64,
    pub maintenance_share: f64,
    pub insurance_share: f64,
    pub account_share: f64,
    pub cellular_share: f64,
    pub fuel_cost: f64,
    pub reward_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_snapshot_ref: Option<String>,
}

impl TripRecordDraft {
    /// Build the persistable draft from full-precision session figures.
    #[allow(clippy::too_many_arguments)]
    pub fn from_totals(
        trip_token: Uuid,
        platform: Platform,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: u64,
        distance_km: f64,
        fare_amount: f64,
        costs: &CostBreakdown,
        reward_amount: f64,
        route_snapshot_ref: Option<String>,
    ) -> Self {
        Self {
            trip_token,
            platform,
            start_time,
            end_time,
            duration_seconds,
            distance_km: round4(distance_km),
            fare_amount: round4(fare_amount),
            commission: round4(costs.commission),
            maintenance_share: round4(costs.maintenance_share),
            insurance_share: round4(costs.insurance_share),
            account_share: round4(costs.account_share),
            cellular_share: round4(costs.cellular_share),
            fuel_cost: round4(costs.fuel_cost),
            reward_amount: round4(reward_amount),
            route_snapshot_ref,
        }
    }

    pub fn into_record(self, id: TripId) -> TripRecord {
        TripRecord {
            id,
            platform: self.platform,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
            distance_km: self.distance_km,
            fare_amount: self.fare_amount,
            commission: self.commission,
            maintenance_share: self.maintenance_share,
            insurance_share: self.insurance_share,
            account_share: self.account_share,
            cellular_share: self.cellular_share,
            fuel_cost: self.fuel_cost,
            reward_amount: self.reward_amount,
            route_snapshot_ref: self.route_snapshot_ref,
        }
    }
}

/// Immutable persisted trip. Exactly one is created per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub platform: Platform,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_km: f64,
    pub fare_amount: f64,
    pub commission: f64,
    pub maintenance_share: f64,
    pub insurance_share: f64,
    pub account_share: f64,
    pub cellular_share: f64,
    pub fuel_cost: f64,
    pub reward_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_snapshot_ref: Option<String>,
}

impl TripRecord {
    /// Net earnings: fare minus commission and every prorated share.
    /// Not clamped; negative net is a valid business outcome.
    pub fn net(&self) -> f64 {
        self.fare_amount
            - self.commission
            - self.maintenance_share
            - self.account_share
            - self.cellular_share
            - self.insurance_share
            - self.fuel_cost
    }
}

/// Processing state of a reward entry; advanced by a remote validation
/// process outside this engine's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Pending,
    Validated,
    Rejected,
}

/// Ledger entry for the distance-based reward token, created independently
/// of the trip record it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTransaction {
    pub trip_id: TripId,
    pub reward_amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RewardStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rounding_helpers_hit_storage_and_display_precision() {
        assert_eq!(round4(0.027_777_77), 0.0278);
        assert_eq!(round4(0.013_888_88), 0.0139);
        assert_eq!(round2(16.278_3), 16.28);
    }

    #[test]
    fn draft_rounds_monetary_fields_and_record_net_is_unclamped() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 9, 20, 0).unwrap();
        let costs = CostBreakdown {
            commission: 2.0,
            maintenance_share: 1.000_004,
            insurance_share: 0.027_777_77,
            account_share: 0.0,
            cellular_share: 0.013_888_88,
            fuel_cost: 0.68,
        };

        let draft = TripRecordDraft::from_totals(
            Uuid::new_v4(),
            Platform::Uber,
            start,
            end,
            1200,
            10.000_049,
            20.0,
            &costs,
            8.0,
            None,
        );

        assert_eq!(draft.maintenance_share, 1.0);
        assert_eq!(draft.insurance_share, 0.0278);
        assert_eq!(draft.cellular_share, 0.0139);
        assert_eq!(draft.distance_km, 10.0);

        let record = draft.into_record(TripId("trip-1".to_string()));
        assert!((record.net() - 16.278_3).abs() < 1e-9);
    }
}
