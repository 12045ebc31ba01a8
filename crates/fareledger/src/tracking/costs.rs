use serde::{Deserialize, Serialize};

/// Flat-month proration base: 30 days of 24 hours.
const HOURS_PER_MONTH: f64 = 30.0 * 24.0;

/// Ride platform the fare was earned on. The commission schedule is part
/// of the platform identity, not configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Uber,
    Indrive,
    Libre,
}

impl Platform {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uber => "UBER",
            Self::Indrive => "INDRIVE",
            Self::Libre => "LIBRE",
        }
    }

    pub const fn commission_rate(self) -> f64 {
        match self {
            Self::Uber => 0.10,
            Self::Indrive => 0.129,
            Self::Libre => 0.0,
        }
    }
}

/// A driver's recurring, non-trip expenses, snapshotted immutably at trip
/// start and allocated across the trip by time or distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCostProfile {
    pub maintenance_cost_per_interval: f64,
    pub maintenance_interval_km: f64,
    pub insurance_monthly: f64,
    pub cellular_rent_monthly: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_payment_monthly: Option<f64>,
    pub fuel_consumption_per_100km: f64,
    pub fuel_price_per_liter: f64,
}

/// Platform's percentage cut of the fare.
pub fn commission(fare: f64, platform: Platform) -> f64 {
    fare * platform.commission_rate()
}

/// Share of a monthly cost attributable to `elapsed_seconds` of driving.
pub fn time_prorated_share(monthly_amount: f64, elapsed_seconds: u64) -> f64 {
    (monthly_amount / HOURS_PER_MONTH) * (elapsed_seconds as f64 / 3600.0)
}

/// Share of an interval-based cost attributable to `distance_km` driven.
/// A non-positive interval yields a zero share rather than a division
/// blow-up; shares are always >= 0.
pub fn distance_prorated_share(cost_per_interval: f64, interval_km: f64, distance_km: f64) -> f64 {
    if interval_km <= 0.0 {
        return 0.0;
    }
    (cost_per_interval / interval_km) * distance_km
}

/// Fuel spend for the distance driven.
pub fn fuel_cost(consumption_per_100km: f64, distance_km: f64, price_per_liter: f64) -> f64 {
    (consumption_per_100km / 100.0) * distance_km * price_per_liter
}

/// Every per-trip deduction, computed from immutable inputs. Values are
/// kept at full precision here; rounding happens only when a record is
/// built for persistence or display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub commission: f64,
    pub maintenance_share: f64,
    pub insurance_share: f64,
    pub account_share: f64,
    pub cellular_share: f64,
    pub fuel_cost: f64,
}

impl CostBreakdown {
    pub fn allocate(
        profile: &FixedCostProfile,
        platform: Platform,
        fare: f64,
        distance_km: f64,
        elapsed_seconds: u64,
    ) -> Self {
        Self {
            commission: commission(fare, platform),
            maintenance_share: distance_prorated_share(
                profile.maintenance_cost_per_interval,
                profile.maintenance_interval_km,
                distance_km,
            ),
            insurance_share: time_prorated_share(profile.insurance_monthly, elapsed_seconds),
            account_share: profile
                .account_payment_monthly
                .map(|monthly| time_prorated_share(monthly, elapsed_seconds))
                .unwrap_or(0.0),
            cellular_share: time_prorated_share(profile.cellular_rent_monthly, elapsed_seconds),
            fuel_cost: fuel_cost(
                profile.fuel_consumption_per_100km,
                distance_km,
                profile.fuel_price_per_liter,
            ),
        }
    }

    /// Net earnings for the trip. Deliberately unclamped: a short ride
    /// with heavy fixed costs can legitimately come out negative.
    pub fn net(&self, fare: f64) -> f64 {
        fare - self.commission
            - self.maintenance_share
            - self.account_share
            - self.cellular_share
            - self.insurance_share
            - self.fuel_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> FixedCostProfile {
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

    #[test]
    fn commission_schedule_matches_platform_contracts() {
        assert_eq!(commission(100.0, Platform::Uber), 10.0);
        assert!((commission(100.0, Platform::Indrive) - 12.90).abs() < 1e-9);
        assert_eq!(commission(100.0, Platform::Libre), 0.0);
    }

    #[test]
    fn monthly_cost_over_one_hour_is_one_seven_twentieth() {
        // 720 currency units per month over 720 hours, driven for one hour.
        assert!((time_prorated_share(720.0, 3600) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn maintenance_share_is_distance_prorated() {
        assert!((distance_prorated_share(500.0, 5000.0, 50.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_maintenance_interval_yields_zero_share() {
        assert_eq!(distance_prorated_share(500.0, 0.0, 50.0), 0.0);
        assert_eq!(distance_prorated_share(500.0, -1.0, 50.0), 0.0);
    }

    #[test]
    fn fuel_cost_follows_consumption_and_price() {
        assert!((fuel_cost(8.0, 10.0, 0.85) - 0.68).abs() < 1e-12);
    }

    #[test]
    fn net_is_not_clamped_at_zero() {
        let breakdown = CostBreakdown::allocate(&profile(), Platform::Indrive, 1.0, 80.0, 7200);
        assert!(breakdown.net(1.0) < 0.0);
    }

    #[test]
    fn reference_trip_allocates_to_the_documented_figures() {
        // $20 UBER fare, 10 km in 1200 s against the default cost profile.
        let breakdown = CostBreakdown::allocate(&profile(), Platform::Uber, 20.0, 10.0, 1200);

        assert!((breakdown.commission - 2.0).abs() < 1e-9);
        assert!((breakdown.maintenance_share - 1.0).abs() < 1e-9);
        assert!((breakdown.fuel_cost - 0.68).abs() < 1e-9);
        assert!((breakdown.insurance_share - 0.027_777_8).abs() < 1e-6);
        assert!((breakdown.cellular_share - 0.013_888_9).abs() < 1e-6);
        assert_eq!(breakdown.account_share, 0.0);
        assert!((breakdown.net(20.0) - 16.278_3).abs() < 1e-4);
    }

    #[test]
    fn account_payment_is_prorated_when_present() {
        let mut with_account = profile();
        with_account.account_payment_monthly = Some(720.0);
        let breakdown = CostBreakdown::allocate(&with_account, Platform::Libre, 10.0, 0.0, 3600);
        assert!((breakdown.account_share - 1.0).abs() < 1e-12);
    }
}
