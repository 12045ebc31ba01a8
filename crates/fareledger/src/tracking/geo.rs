use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, the constant the great-circle
/// computation is calibrated against.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A single positional fix as delivered by the location sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl GeoSample {
    /// Accept the sample only when both coordinates are finite numbers.
    ///
    /// Rejection is non-fatal: callers log the drop and continue, the
    /// running totals are never touched by a malformed fix.
    pub fn validate(self) -> Result<Self, SampleRejected> {
        if !self.latitude.is_finite() {
            return Err(SampleRejected::NonFiniteLatitude(self.latitude));
        }
        if !self.longitude.is_finite() {
            return Err(SampleRejected::NonFiniteLongitude(self.longitude));
        }
        Ok(self)
    }
}

/// A malformed positional sample. Dropped and logged, never surfaced to
/// the caller as a user-facing failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SampleRejected {
    #[error("latitude {0} is not a finite number")]
    NonFiniteLatitude(f64),
    #[error("longitude {0} is not a finite number")]
    NonFiniteLongitude(f64),
}

/// Great-circle distance between two samples in kilometers (haversine).
pub fn haversine_km(a: &GeoSample, b: &GeoSample) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Converts consecutive valid samples into a monotone cumulative distance
/// and retains the ordered route path for the trip record.
#[derive(Debug, Default, Clone)]
pub struct DistanceAccumulator {
    route: Vec<GeoSample>,
    total_km: f64,
}

impl DistanceAccumulator {
    /// Append the next valid sample, returning the distance increment it
    /// contributed. The first sample of a trip contributes zero. A NaN
    /// increment (degenerate coordinates) is treated as zero so it can
    /// never corrupt the running total.
    pub fn record(&mut self, sample: GeoSample) -> f64 {
        let increment = match self.route.last() {
            Some(previous) => {
                let step = haversine_km(previous, &sample);
                if step.is_nan() {
                    0.0
                } else {
                    step
                }
            }
            None => 0.0,
        };

        self.route.push(sample);
        self.total_km += increment;
        increment
    }

    pub fn total_km(&self) -> f64 {
        self.total_km
    }

    pub fn route(&self) -> &[GeoSample] {
        &self.route
    }

    pub fn sample_count(&self) -> usize {
        self.route.len()
    }
}
