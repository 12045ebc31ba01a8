use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::geo::GeoSample;
use super::lifecycle::TripLifecycle;
use super::reward::RewardRateSource;
use crate::persistence::{RewardLedger, TripStore};

const SAMPLE_BUFFER: usize = 64;

/// Producer half handed to the location sampler collaborator. Dropping
/// every feed (or the tracker aborting) closes the stream.
#[derive(Clone)]
pub struct SampleFeed {
    tx: mpsc::Sender<GeoSample>,
}

impl SampleFeed {
    pub async fn send(&self, sample: GeoSample) -> Result<(), FeedClosed> {
        self.tx.send(sample).await.map_err(|_| FeedClosed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("location feed is closed")]
pub struct FeedClosed;

/// Owns the clock-tick and location-stream tasks for one active trip.
/// Both tasks are aborted on drop, so the subscriptions are released on
/// every exit path (stop, cancel, teardown) rather than best-effort.
pub struct TrackerGuard {
    clock: JoinHandle<()>,
    samples: JoinHandle<()>,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        self.clock.abort();
        self.samples.abort();
    }
}

/// Start the two event sources for an active trip. Both post into the
/// lifecycle's mutex, so accumulator updates serialize and the distance
/// monotonicity invariant holds even on a multi-threaded runtime.
pub fn spawn_tracker<S, L, R>(
    lifecycle: Arc<Mutex<TripLifecycle<S, L, R>>>,
    tick_interval: Duration,
) -> (SampleFeed, TrackerGuard)
where
    S: TripStore + 'static,
    L: RewardLedger + 'static,
    R: RewardRateSource + 'static,
{
    let (tx, mut rx) = mpsc::channel::<GeoSample>(SAMPLE_BUFFER);

    let clock_lifecycle = lifecycle.clone();
    let tick_seconds = tick_interval.as_secs().max(1);
    let clock = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            clock_lifecycle.lock().await.record_tick(tick_seconds);
        }
    });

    let samples = tokio::spawn(async move {
        while let Some(sample) = rx.recv().await {
            lifecycle.lock().await.record_sample(sample);
        }
    });

    (SampleFeed { tx }, TrackerGuard { clock, samples })
}
