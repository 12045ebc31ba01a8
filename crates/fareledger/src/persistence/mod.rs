//! Two-step, offline-first persistence protocol for finished trips.
//!
//! A trip is committed locally first, then remotely; the reward entry is
//! committed as an independent second step keyed by the trip id the first
//! step produced. Neither step failing aborts anything: the caller always
//! receives a usable record plus warnings describing what degraded.

pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::tracking::record::{
    RewardStatus, RewardTransaction, TripId, TripRecord, TripRecordDraft,
};
use local::LocalTripCache;

/// Remote trip endpoint: accepts a finished trip, returns it with the
/// id the backend assigned.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn commit_trip(&self, draft: TripRecordDraft) -> Result<TripRecord, StoreError>;
    async fn recent_trips(&self, limit: usize) -> Result<Vec<TripRecord>, StoreError>;
}

/// Remote reward-ledger endpoint. Entries start `Pending`; a validation
/// process outside this engine advances them later.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn commit_reward(
        &self,
        transaction: RewardTransaction,
    ) -> Result<RewardTransaction, LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote rejected the trip: status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("ledger rejected the transaction: status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failures constructing an adapter or loading the durable cache.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway base URL is not configured")]
    MissingBaseUrl,
    #[error("failed to build the http client: {0}")]
    ClientBuild(String),
    #[error("failed to load the trip cache: {0}")]
    CacheLoad(String),
}

/// Non-blocking degradation reports attached to a commit outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitWarning {
    /// The remote trip endpoint failed; the returned record is the local
    /// cache copy and can be retried later by the caller.
    TripKeptLocally { reason: String },
    /// The trip record was created but the reward entry was not; the
    /// reward needs later reconciliation against this trip id.
    RewardNotCommitted { trip_id: TripId, reason: String },
}

/// Result of the two-step commit. Exactly one record per trip session,
/// whatever failed along the way.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub record: TripRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardTransaction>,
    pub warnings: Vec<CommitWarning>,
}

/// Orchestrates the local cache and the remote store/ledger pair.
pub struct PersistenceGateway<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    cache: Arc<LocalTripCache>,
}

impl<S, L> Clone for PersistenceGateway<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S, L> PersistenceGateway<S, L>
where
    S: TripStore,
    L: RewardLedger,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, cache: Arc<LocalTripCache>) -> Self {
        Self {
            store,
            ledger,
            cache,
        }
    }

    pub fn cache(&self) -> &LocalTripCache {
        &self.cache
    }

    /// Commit a finished trip: durable local copy first, remote second,
    /// then the independent reward step.
    pub async fn commit(&self, draft: TripRecordDraft) -> CommitOutcome {
        let mut warnings = Vec::new();

        let local_id = TripId(format!("local-{}", draft.trip_token));
        let local_record = draft.clone().into_record(local_id.clone());
        self.cache.insert(local_record.clone());

        let record = match self.store.commit_trip(draft.clone()).await {
            Ok(remote_record) => {
                self.cache.replace(&local_id, remote_record.clone());
                remote_record
            }
            Err(err) => {
                warn!(trip_token = %draft.trip_token, error = %err, "trip commit degraded to local cache");
                warnings.push(CommitWarning::TripKeptLocally {
                    reason: err.to_string(),
                });
                local_record
            }
        };

        let transaction = RewardTransaction {
            trip_id: record.id.clone(),
            reward_amount: draft.reward_amount,
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: RewardStatus::Pending,
        };

        let reward = match self.ledger.commit_reward(transaction).await {
            Ok(committed) => Some(committed),
            Err(err) => {
                warn!(trip_id = %record.id, error = %err, "reward commit failed; trip record kept");
                warnings.push(CommitWarning::RewardNotCommitted {
                    trip_id: record.id.clone(),
                    reason: err.to_string(),
                });
                None
            }
        };

        CommitOutcome {
            record,
            reward,
            warnings,
        }
    }

    /// Trip history, remote first, falling back to the newest-first local
    /// cache when the remote is unreachable. No conflict resolution.
    pub async fn history(&self, limit: usize) -> Vec<TripRecord> {
        match self.store.recent_trips(limit).await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "trip history unavailable remotely; serving local cache");
                self.cache.newest_first(limit)
            }
        }
    }
}
