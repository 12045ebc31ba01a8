//! Live trip tracking: sample validation, distance and clock
//! accumulation, reward accrual, cost allocation, and the lifecycle
//! state machine tying them to the persistence gateway.

pub mod costs;
pub mod geo;
pub mod lifecycle;
pub mod record;
pub mod reward;
pub mod router;
pub mod runner;
pub mod session;

pub use costs::{CostBreakdown, FixedCostProfile, Platform};
pub use geo::{haversine_km, DistanceAccumulator, GeoSample, SampleRejected, EARTH_RADIUS_KM};
pub use lifecycle::{LifecycleError, PendingCommit, TripLifecycle, TripState, TripStatus};
pub use record::{
    round2, round4, RewardStatus, RewardTransaction, TripId, TripRecord, TripRecordDraft,
};
pub use reward::{FixedRate, RateFetchError, RewardRateSource, FALLBACK_RATE_PER_KM};
pub use router::{trip_router, TripApi};
pub use runner::{spawn_tracker, FeedClosed, SampleFeed, TrackerGuard};
pub use session::TripSession;
