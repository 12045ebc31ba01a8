use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{GatewayError, LedgerError, StoreError, TripStore};
use crate::config::GatewayConfig;
use crate::persistence::RewardLedger;
use crate::tracking::record::{RewardTransaction, TripId, TripRecord, TripRecordDraft};
use crate::tracking::reward::{RateFetchError, RewardRateSource};

/// Bearer-authenticated adapter for the remote trip, reward-ledger, and
/// mining-rate endpoints. Each request carries the client-wide timeout;
/// there are no automatic retries at this layer.
pub struct RemoteGateway {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedTrip {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MiningRate {
    rate_per_km: f64,
}

impl RemoteGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or(GatewayError::MissingBaseUrl)?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GatewayError::ClientBuild(err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn classify_store(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else if err.is_decode() {
        StoreError::Malformed(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

fn classify_ledger(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Timeout
    } else if err.is_decode() {
        LedgerError::Malformed(err.to_string())
    } else {
        LedgerError::Transport(err.to_string())
    }
}

#[async_trait]
impl TripStore for RemoteGateway {
    async fn commit_trip(&self, draft: TripRecordDraft) -> Result<TripRecord, StoreError> {
        let response = self
            .authorized(self.http.post(self.endpoint("/trips")))
            .json(&draft)
            .send()
            .await
            .map_err(classify_store)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let created: CreatedTrip = response.json().await.map_err(classify_store)?;
        Ok(draft.into_record(TripId(created.id)))
    }

    async fn recent_trips(&self, limit: usize) -> Result<Vec<TripRecord>, StoreError> {
        let response = self
            .authorized(self.http.get(self.endpoint("/trips")))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(classify_store)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        response.json().await.map_err(classify_store)
    }
}

#[async_trait]
impl RewardLedger for RemoteGateway {
    async fn commit_reward(
        &self,
        transaction: RewardTransaction,
    ) -> Result<RewardTransaction, LedgerError> {
        let response = self
            .authorized(self.http.post(self.endpoint("/reward-transactions")))
            .json(&transaction)
            .send()
            .await
            .map_err(classify_ledger)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status(status.as_u16()));
        }

        response.json().await.map_err(classify_ledger)
    }
}

#[async_trait]
impl RewardRateSource for RemoteGateway {
    async fn rate_per_km(&self) -> Result<f64, RateFetchError> {
        let response = self
            .authorized(self.http.get(self.endpoint("/profile/mining-rate")))
            .send()
            .await
            .map_err(|err| RateFetchError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RateFetchError::Unreachable("rate profile missing".to_string()));
        }
        if !status.is_success() {
            return Err(RateFetchError::Unreachable(format!("status {status}")));
        }

        let rate: MiningRate = response
            .json()
            .await
            .map_err(|err| RateFetchError::Malformed(err.to_string()))?;

        if !rate.rate_per_km.is_finite() || rate.rate_per_km < 0.0 {
            return Err(RateFetchError::Malformed(format!(
                "rate {} out of range",
                rate.rate_per_km
            )));
        }

        Ok(rate.rate_per_km)
    }
}
