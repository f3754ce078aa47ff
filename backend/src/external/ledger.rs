//! Notarization ledger client
//!
//! The ledger is consumed through two calls only: submit a notarization and
//! read back the notarized record for an item id. Failures are always
//! surfaced; nothing here retries.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::{NotarizationReceipt, NotarizedRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Address the ledger reports for ids that were never notarized
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Ledger call failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Transport(String),

    #[error("ledger rejected the request: {0}")]
    Rejected(String),

    #[error("malformed ledger response: {0}")]
    Decode(String),

    #[error("ledger did not answer within {0:?}")]
    Timeout(Duration),
}

/// Narrow contract over the external ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Freeze a price/quantity pair for `item_id`
    async fn notarize(
        &self,
        item_id: Uuid,
        price: u64,
        quantity: u64,
    ) -> Result<NotarizationReceipt, LedgerError>;

    /// Read the notarized record, `None` if the id was never notarized
    async fn read_record(&self, item_id: Uuid) -> Result<Option<NotarizedRecord>, LedgerError>;
}

/// An empty or zero notarizer marks an id the ledger has never seen
pub fn is_unset_notarizer(notarized_by: &str) -> bool {
    let trimmed = notarized_by.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ZERO_ADDRESS)
}

// ============================================================================
// HTTP gateway client
// ============================================================================

/// Client for the ledger's HTTP gateway
#[derive(Clone)]
pub struct HttpLedgerClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct NotarizeRequest {
    item_id: Uuid,
    price: u64,
    quantity: u64,
}

#[derive(Debug, Deserialize)]
struct NotarizeResponse {
    transaction_hash: String,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    price: u64,
    quantity: u64,
    notarized_by: String,
    timestamp: i64,
}

impl HttpLedgerClient {
    /// Create a new HttpLedgerClient
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }

    async fn error_from(response: reqwest::Response) -> LedgerError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{} - {}", status, body)
        };

        if status.is_client_error() {
            LedgerError::Rejected(message)
        } else {
            LedgerError::Transport(message)
        }
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Transport(format!("request timed out: {}", err))
    } else {
        LedgerError::Transport(err.to_string())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn notarize(
        &self,
        item_id: Uuid,
        price: u64,
        quantity: u64,
    ) -> Result<NotarizationReceipt, LedgerError> {
        let url = format!("{}/notarizations", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&NotarizeRequest {
                item_id,
                price,
                quantity,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let data: NotarizeResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if data.transaction_hash.trim().is_empty() {
            return Err(LedgerError::Decode("empty transaction hash".to_string()));
        }

        Ok(NotarizationReceipt {
            transaction_hash: data.transaction_hash,
        })
    }

    async fn read_record(&self, item_id: Uuid) -> Result<Option<NotarizedRecord>, LedgerError> {
        let url = format!("{}/records/{}", self.base_url, item_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let data: RecordResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if is_unset_notarizer(&data.notarized_by) {
            return Ok(None);
        }

        Ok(Some(NotarizedRecord {
            item_id,
            price: data.price,
            quantity: data.quantity,
            notarized_by: data.notarized_by,
            timestamp: data.timestamp,
        }))
    }
}

// ============================================================================
// In-memory ledger
// ============================================================================

/// Ledger kept in process memory, for tests and local development.
///
/// Failures and latency can be injected to exercise the rollback paths.
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<InMemoryLedgerState>,
}

struct InMemoryLedgerState {
    signer: String,
    records: Mutex<HashMap<Uuid, NotarizedRecord>>,
    failure: Mutex<Option<LedgerError>>,
    delay: Mutex<Option<Duration>>,
    notarize_calls: AtomicUsize,
    sequence: AtomicU64,
}

impl InMemoryLedger {
    pub fn new(signer: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(InMemoryLedgerState {
                signer: signer.into(),
                records: Mutex::new(HashMap::new()),
                failure: Mutex::new(None),
                delay: Mutex::new(None),
                notarize_calls: AtomicUsize::new(0),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Make every notarize call fail with `failure` until cleared
    pub fn fail_with(&self, failure: Option<LedgerError>) {
        if let Ok(mut slot) = self.inner.failure.lock() {
            *slot = failure;
        }
    }

    /// Delay every notarize call
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.inner.delay.lock() {
            *slot = delay;
        }
    }

    /// Number of notarize calls received, successful or not
    pub fn notarize_calls(&self) -> usize {
        self.inner.notarize_calls.load(Ordering::SeqCst)
    }

    fn lock_err<T>(_: T) -> LedgerError {
        LedgerError::Transport("ledger state poisoned".to_string())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn notarize(
        &self,
        item_id: Uuid,
        price: u64,
        quantity: u64,
    ) -> Result<NotarizationReceipt, LedgerError> {
        self.inner.notarize_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.delay.lock().map_err(Self::lock_err)?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.inner.failure.lock().map_err(Self::lock_err)?.clone();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = NotarizedRecord {
            item_id,
            price,
            quantity,
            notarized_by: self.inner.signer.clone(),
            timestamp: Utc::now().timestamp(),
        };
        self.inner
            .records
            .lock()
            .map_err(Self::lock_err)?
            .insert(item_id, record);

        Ok(NotarizationReceipt {
            transaction_hash: format!("0x{:064x}", seq),
        })
    }

    async fn read_record(&self, item_id: Uuid) -> Result<Option<NotarizedRecord>, LedgerError> {
        let records = self.inner.records.lock().map_err(Self::lock_err)?;
        Ok(records.get(&item_id).cloned())
    }
}
