use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::costs::{CostBreakdown, FixedCostProfile, Platform};
use super::geo::GeoSample;
use super::record::{round4, TripRecordDraft};
use super::reward::{RewardRateSource, FALLBACK_RATE_PER_KM};
use super::runner::TrackerGuard;
use super::session::TripSession;
use crate::persistence::{CommitOutcome, PersistenceGateway, RewardLedger, TripStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    Idle,
    AwaitingFare,
    Active,
    Ending,
    Completed,
}

impl TripState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFare => "awaiting_fare",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Completed => "completed",
        }
    }
}

/// Live view of the tracked trip, published on every accumulator update
/// so observers (UI, API) never own tracking state of their own.
#[derive(Debug, Clone, Serialize)]
pub struct TripStatus {
    pub state: TripState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare_amount: Option<f64>,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub reward_accrued: f64,
    pub samples_recorded: usize,
    pub samples_dropped: u64,
}

impl TripStatus {
    fn idle() -> Self {
        Self {
            state: TripState::Idle,
            platform: None,
            fare_amount: None,
            distance_km: 0.0,
            elapsed_seconds: 0,
            reward_accrued: 0.0,
            samples_recorded: 0,
            samples_dropped: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The start transition requires a fare amount greater than zero;
    /// rejection leaves the machine in `AwaitingFare`.
    #[error("fare amount must be a number greater than zero")]
    InvalidFare,
    #[error("{operation} is not allowed while the trip is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}

/// State machine orchestrating the live trip: sample validation, distance
/// and clock accumulation, reward accrual, and the hand-off to the
/// persistence gateway when a trip finishes.
///
/// Mutable state has a single writer; callers share the machine behind a
/// `tokio::sync::Mutex` so sample and tick updates serialize.
pub struct TripLifecycle<S, L, R> {
    gateway: PersistenceGateway<S, L>,
    rates: Arc<R>,
    profile: FixedCostProfile,
    state: TripState,
    session: Option<TripSession>,
    tracker: Option<TrackerGuard>,
    status_tx: watch::Sender<TripStatus>,
}

impl<S, L, R> TripLifecycle<S, L, R>
where
    S: TripStore,
    L: RewardLedger,
    R: RewardRateSource,
{
    pub fn new(gateway: PersistenceGateway<S, L>, rates: Arc<R>, profile: FixedCostProfile) -> Self {
        let (status_tx, _) = watch::channel(TripStatus::idle());
        Self {
            gateway,
            rates,
            profile,
            state: TripState::Idle,
            session: None,
            tracker: None,
            status_tx,
        }
    }

    /// Observe state-change notifications without owning any state.
    pub fn subscribe(&self) -> watch::Receiver<TripStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub fn status(&self) -> TripStatus {
        match &self.session {
            Some(session) => TripStatus {
                state: self.state,
                platform: Some(session.platform()),
                fare_amount: Some(session.fare_amount()),
                distance_km: round4(session.distance_km()),
                elapsed_seconds: session.accumulated_seconds(),
                reward_accrued: round4(session.reward_accrued()),
                samples_recorded: session.sample_count(),
                samples_dropped: session.dropped_samples(),
            },
            None => TripStatus {
                state: self.state,
                ..TripStatus::idle()
            },
        }
    }

    /// Prepare for a new trip, discarding whatever the previous session
    /// accumulated. Legal from `Idle`, `Completed`, or already
    /// `AwaitingFare`; an in-flight trip has to be stopped or cancelled
    /// first.
    pub fn new_trip(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            TripState::Idle | TripState::Completed | TripState::AwaitingFare => {
                self.session = None;
                self.tracker = None;
                self.state = TripState::AwaitingFare;
                self.publish();
                Ok(())
            }
            state => Err(LifecycleError::InvalidTransition {
                operation: "starting a new trip",
                state: state.label(),
            }),
        }
    }

    /// `AwaitingFare -> Active`. Validates the fare, snapshots the fixed
    /// cost profile, and fetches the reward rate exactly once; if the
    /// rate source is unreachable the fixed fallback applies for the
    /// remainder of the trip.
    pub async fn start(
        &mut self,
        platform: Platform,
        fare_amount: f64,
        started_at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.state != TripState::AwaitingFare {
            return Err(LifecycleError::InvalidTransition {
                operation: "start",
                state: self.state.label(),
            });
        }
        if !(fare_amount > 0.0) {
            return Err(LifecycleError::InvalidFare);
        }

        let rate_per_km = match self.rates.rate_per_km().await {
            Ok(rate) => rate,
            Err(err) => {
                warn!(error = %err, fallback = FALLBACK_RATE_PER_KM, "reward rate unavailable, using fallback");
                FALLBACK_RATE_PER_KM
            }
        };

        let session = TripSession::new(
            platform,
            fare_amount,
            self.profile.clone(),
            rate_per_km,
            started_at,
        );
        info!(trip_token = %session.trip_token(), platform = platform.label(), "trip started");

        self.session = Some(session);
        self.state = TripState::Active;
        self.publish();
        Ok(())
    }

    /// Keep the clock/location tasks owned by the machine so they are
    /// released on stop, cancel, and drop alike.
    pub fn attach_tracker(&mut self, guard: TrackerGuard) {
        self.tracker = Some(guard);
    }

    /// Fold one raw positional sample into the session. Malformed
    /// samples are dropped and logged; they never surface as errors and
    /// never touch the running totals. A no-op outside `Active`.
    pub fn record_sample(&mut self, sample: GeoSample) {
        if self.state != TripState::Active {
            debug!(state = self.state.label(), "sample ignored outside active trip");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match sample.validate() {
            Ok(valid) => {
                session.record_sample(valid);
            }
            Err(rejected) => {
                debug!(reason = %rejected, "geo sample dropped");
                session.note_dropped_sample();
            }
        }
        self.publish();
    }

    /// Advance the trip clock. A no-op outside `Active`.
    pub fn record_tick(&mut self, seconds: u64) {
        if self.state != TripState::Active {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.record_tick(seconds);
        }
        self.publish();
    }

    /// `Active -> Ending`: release the clock/location tasks and capture
    /// the end time. The financial finalize is a separate step so a
    /// caller can still hold its own confirmation gate.
    pub fn stop(&mut self, ended_at: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.state != TripState::Active {
            return Err(LifecycleError::InvalidTransition {
                operation: "stop",
                state: self.state.label(),
            });
        }

        self.tracker = None;
        if let Some(session) = self.session.as_mut() {
            session.mark_ended(ended_at);
        }
        self.state = TripState::Ending;
        self.publish();
        Ok(())
    }

    /// Discard the session without producing a record. Legal any time
    /// before finalize commits.
    pub fn cancel(&mut self) {
        if matches!(self.state, TripState::Active | TripState::Ending) {
            info!("trip cancelled, session discarded");
        }
        self.tracker = None;
        self.session = None;
        self.state = TripState::Idle;
        self.publish();
    }

    /// `Ending -> Completed`: allocate the final cost shares and produce
    /// the commit step. The returned [`PendingCommit`] carries its own
    /// gateway handle and the draft tagged with the session token, so the
    /// commit can resolve after this machine has moved on to a new trip.
    pub fn finalize(
        &mut self,
        route_snapshot_ref: Option<String>,
    ) -> Result<PendingCommit<S, L>, LifecycleError> {
        if self.state != TripState::Ending {
            return Err(LifecycleError::InvalidTransition {
                operation: "finalize",
                state: self.state.label(),
            });
        }
        let Some(session) = self.session.as_ref() else {
            return Err(LifecycleError::InvalidTransition {
                operation: "finalize",
                state: "missing session",
            });
        };

        let ended_at = session.ended_at().unwrap_or_else(Utc::now);
        let costs = CostBreakdown::allocate(
            session.profile(),
            session.platform(),
            session.fare_amount(),
            session.distance_km(),
            session.accumulated_seconds(),
        );

        let draft = TripRecordDraft::from_totals(
            session.trip_token(),
            session.platform(),
            session.started_at(),
            ended_at,
            session.accumulated_seconds(),
            session.distance_km(),
            session.fare_amount(),
            &costs,
            session.reward_accrued(),
            route_snapshot_ref,
        );

        self.state = TripState::Completed;
        self.publish();

        Ok(PendingCommit {
            gateway: self.gateway.clone(),
            draft,
        })
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

/// A finalized trip waiting on the two-step persistence protocol.
///
/// Deliberately detached from the lifecycle: committing takes network
/// time and must not block the next trip from starting, and the draft is
/// tagged with the originating session token rather than any ambient
/// "current trip" reference.
pub struct PendingCommit<S, L> {
    gateway: PersistenceGateway<S, L>,
    draft: TripRecordDraft,
}

impl<S, L> PendingCommit<S, L>
where
    S: TripStore,
    L: RewardLedger,
{
    pub fn draft(&self) -> &TripRecordDraft {
        &self.draft
    }

    pub async fn commit(self) -> CommitOutcome {
        self.gateway.commit(self.draft).await
    }
}
