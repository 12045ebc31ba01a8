use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;

use crate::infra::{InMemoryRewardLedger, InMemoryTripStore};
use fareledger::error::AppError;
use fareledger::persistence::local::LocalTripCache;
use fareledger::persistence::PersistenceGateway;
use fareledger::tracking::{
    round2, FixedCostProfile, FixedRate, GeoSample, Platform, TripLifecycle, FALLBACK_RATE_PER_KM,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Platform the simulated fare is earned on (uber, indrive, libre)
    #[arg(long, default_value = "uber", value_parser = crate::infra::parse_platform)]
    pub(crate) platform: Platform,
    /// Fare amount for the simulated trip
    #[arg(long, default_value_t = 20.0)]
    pub(crate) fare: f64,
    /// Distance covered by the simulated route, in kilometres
    #[arg(long, default_value_t = 10.0)]
    pub(crate) distance_km: f64,
    /// Trip duration in seconds
    #[arg(long, default_value_t = 1200)]
    pub(crate) duration_secs: u64,
}

/// Degrees of latitude per kilometre on a 6371 km sphere.
const DEGREES_PER_KM: f64 = 1.0 / 111.194_9;

fn demo_cost_profile() -> FixedCostProfile {
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

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        platform,
        fare,
        distance_km,
        duration_secs,
    } = args;

    println!("Trip earnings demo");
    println!(
        "Simulating a {} trip: fare {:.2}, {:.1} km over {} s",
        platform.label(),
        fare,
        distance_km,
        duration_secs
    );

    let store = Arc::new(InMemoryTripStore::default());
    let ledger = Arc::new(InMemoryRewardLedger::default());
    let cache = Arc::new(LocalTripCache::in_memory());
    let gateway = PersistenceGateway::new(store, ledger.clone(), cache);
    let rates = Arc::new(FixedRate(FALLBACK_RATE_PER_KM));

    let mut lifecycle = TripLifecycle::new(gateway, rates, demo_cost_profile());

    let started_at = Utc::now() - Duration::seconds(duration_secs as i64);
    lifecycle.new_trip()?;
    lifecycle.start(platform, fare, started_at).await?;

    // Synthetic straight-line route: one sample per simulated minute,
    // stepping due north so the haversine sum matches the requested
    // distance.
    let steps = (duration_secs / 60).max(1);
    let step_km = distance_km / steps as f64;
    let mut latitude = 0.0;
    lifecycle.record_sample(GeoSample {
        latitude,
        longitude: 0.0,
        timestamp: started_at,
    });
    for step in 1..=steps {
        latitude += step_km * DEGREES_PER_KM;
        lifecycle.record_sample(GeoSample {
            latitude,
            longitude: 0.0,
            timestamp: started_at + Duration::seconds((step * 60) as i64),
        });
        lifecycle.record_tick(60);
    }
    lifecycle.record_tick(duration_secs.saturating_sub(steps * 60));

    let status = lifecycle.status();
    println!(
        "Tracked {} samples -> {:.4} km in {} s, reward accrued {:.4}",
        status.samples_recorded, status.distance_km, status.elapsed_seconds, status.reward_accrued
    );

    lifecycle.stop(started_at + Duration::seconds(duration_secs as i64))?;
    let outcome = lifecycle.finalize(None)?.commit().await;

    let record = &outcome.record;
    println!("\nCommitted trip {}", record.id);
    println!("- Fare:             {:.2}", record.fare_amount);
    println!("- Commission:       {:.2}", round2(record.commission));
    println!(
        "- Maintenance:      {:.2}",
        round2(record.maintenance_share)
    );
    println!("- Insurance:        {:.2}", round2(record.insurance_share));
    println!("- Cellular:         {:.2}", round2(record.cellular_share));
    if record.account_share > 0.0 {
        println!("- Account:          {:.2}", round2(record.account_share));
    }
    println!("- Fuel:             {:.2}", round2(record.fuel_cost));
    println!("- Net earnings:     {:.2}", round2(record.net()));

    match &outcome.reward {
        Some(reward) => println!(
            "Reward ledger entry: {:.4} tokens for {} (status pending)",
            reward.reward_amount, reward.trip_id
        ),
        None => println!("Reward ledger entry: not committed"),
    }

    if outcome.warnings.is_empty() {
        println!("Persistence warnings: none");
    } else {
        println!("Persistence warnings:");
        for warning in &outcome.warnings {
            match serde_json::to_string(warning) {
                Ok(json) => println!("- {json}"),
                Err(err) => println!("- unprintable warning: {err}"),
            }
        }
    }

    println!(
        "Ledger now holds {} reward transaction(s)",
        ledger.entries().len()
    );

    Ok(())
}
