use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;

use fareledger::persistence::{LedgerError, RewardLedger, StoreError, TripStore};
use fareledger::tracking::{Platform, RewardTransaction, TripId, TripRecord, TripRecordDraft};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Trip store used when no remote gateway is configured (demo posture).
#[derive(Default)]
pub(crate) struct InMemoryTripStore {
    records: Mutex<Vec<TripRecord>>,
    sequence: AtomicU64,
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn commit_trip(&self, draft: TripRecordDraft) -> Result<TripRecord, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record = draft.into_record(TripId(format!("trip-{id:06}")));
        self.records
            .lock()
            .expect("trip store mutex poisoned")
            .insert(0, record.clone());
        Ok(record)
    }

    async fn recent_trips(&self, limit: usize) -> Result<Vec<TripRecord>, StoreError> {
        let records = self.records.lock().expect("trip store mutex poisoned");
        Ok(records.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRewardLedger {
    entries: Mutex<Vec<RewardTransaction>>,
}

impl InMemoryRewardLedger {
    pub(crate) fn entries(&self) -> Vec<RewardTransaction> {
        self.entries.lock().expect("ledger mutex poisoned").clone()
    }
}

#[async_trait]
impl RewardLedger for InMemoryRewardLedger {
    async fn commit_reward(
        &self,
        transaction: RewardTransaction,
    ) -> Result<RewardTransaction, LedgerError> {
        self.entries
            .lock()
            .expect("ledger mutex poisoned")
            .push(transaction.clone());
        Ok(transaction)
    }
}

pub(crate) fn parse_platform(raw: &str) -> Result<Platform, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "uber" => Ok(Platform::Uber),
        "indrive" => Ok(Platform::Indrive),
        "libre" => Ok(Platform::Libre),
        other => Err(format!(
            "unknown platform '{other}' (expected uber, indrive, or libre)"
        )),
    }
}
