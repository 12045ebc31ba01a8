use async_trait::async_trait;

/// Rate applied for the remainder of a trip when the profile endpoint is
/// unreachable at trip start. The rate is never re-fetched mid-trip.
pub const FALLBACK_RATE_PER_KM: f64 = 0.8;

/// Reward accrued for the distance driven so far.
///
/// Always recomputed from the cumulative total rather than incremented
/// per sample, so floating-point drift cannot compound across a trip.
pub fn accrued(distance_km: f64, rate_per_km: f64) -> f64 {
    distance_km * rate_per_km
}

/// Source of the per-kilometer reward rate, consulted exactly once per
/// trip at the start transition.
#[async_trait]
pub trait RewardRateSource: Send + Sync {
    async fn rate_per_km(&self) -> Result<f64, RateFetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateFetchError {
    #[error("rate endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("rate endpoint returned a malformed payload: {0}")]
    Malformed(String),
}

/// Constant-rate source for tests, demos, and deployments without a
/// remote profile service.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub f64);

#[async_trait]
impl RewardRateSource for FixedRate {
    async fn rate_per_km(&self) -> Result<f64, RateFetchError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrual_is_exactly_distance_times_rate() {
        assert_eq!(accrued(0.0, 0.8), 0.0);
        assert_eq!(accrued(12.5, 0.8), 12.5 * 0.8);
        assert_eq!(accrued(3.2, 1.5), 3.2 * 1.5);
    }

    #[tokio::test]
    async fn fixed_rate_source_returns_its_constant() {
        let source = FixedRate(FALLBACK_RATE_PER_KM);
        assert_eq!(source.rate_per_km().await.unwrap(), 0.8);
    }
}
