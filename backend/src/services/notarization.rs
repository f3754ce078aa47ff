//! Notarization workflow
//!
//! `none -> processing -> published`, with a forced `processing -> none`
//! rollback when the ledger call fails or times out. `published -> none` is
//! the explicit unpublish and never contacts the ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    validate_publishable, InventoryItem, NotarizationReceipt, NotarizationStatus,
    NotarizedRecord, PublishedSnapshot,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::ensure_owner;
use super::inventory::ItemView;
use crate::error::{AppError, AppResult};
use crate::external::{LedgerClient, LedgerError};
use crate::store::{update_item, RecordStore};

/// Notarization service
#[derive(Clone)]
pub struct NotarizationService {
    store: Arc<dyn RecordStore>,
    ledger: Arc<dyn LedgerClient>,
    timeout: Duration,
    conflict_retries: u32,
}

/// Ledger record of an item next to the local snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LedgerRecordView {
    pub item_id: Uuid,
    pub item_name: String,
    pub record: Option<NotarizedRecord>,
    pub local_snapshot: Option<PublishedSnapshot>,
    /// Ledger values equal the snapshot stored with the item
    pub matches_snapshot: bool,
}

impl LedgerRecordView {
    fn new(
        item_id: Uuid,
        item_name: String,
        record: Option<NotarizedRecord>,
        local_snapshot: Option<PublishedSnapshot>,
    ) -> Self {
        let matches_snapshot = match (&record, &local_snapshot) {
            (Some(record), Some(snapshot)) => {
                Decimal::from(record.price) == snapshot.price_per_unit
                    && Decimal::from(record.quantity) == snapshot.quantity
            }
            _ => false,
        };

        Self {
            item_id,
            item_name,
            record,
            local_snapshot,
            matches_snapshot,
        }
    }
}

impl NotarizationService {
    /// Create a new NotarizationService instance
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn LedgerClient>,
        timeout: Duration,
        conflict_retries: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            timeout,
            conflict_retries,
        }
    }

    /// Notarize the item's live price and quantity.
    ///
    /// Also the "sync changes" action for a published item that drifted.
    /// The remote phase runs on its own task, so the rollback completes even
    /// if the caller goes away.
    pub async fn publish(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<ItemView> {
        let mut submitted = None;
        update_item(&*self.store, item_id, self.conflict_retries, |item| {
            ensure_owner(item.owner_id, owner_id, "Inventory item")?;
            if item.notarization_status == NotarizationStatus::Processing {
                return Err(AppError::InvalidStateTransition(
                    "Notarization is already in progress".to_string(),
                ));
            }

            let units = validate_publishable(item.price_per_unit, item.quantity)?;
            submitted = Some((units, item.live_values()));
            item.notarization_status = NotarizationStatus::Processing;
            Ok(())
        })
        .await?;

        let Some(((price, quantity), snapshot)) = submitted else {
            return Err(AppError::Internal(
                "publish committed without submitted values".to_string(),
            ));
        };
        tracing::info!(item_id = %item_id, price, quantity, "notarization processing");

        let store = self.store.clone();
        let ledger = self.ledger.clone();
        let timeout = self.timeout;
        let attempts = self.conflict_retries;

        let task = tokio::spawn(async move {
            let call = ledger.notarize(item_id, price, quantity);
            let outcome = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::Timeout(timeout)),
            };
            complete(&*store, item_id, attempts, snapshot, outcome).await
        });

        let item = task
            .await
            .map_err(|e| AppError::Internal(format!("notarization task failed: {}", e)))??;
        Ok(item.into())
    }

    /// Hide the item from buyers. Snapshot, receipt and sync time are kept.
    pub async fn unpublish(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<ItemView> {
        let item = update_item(&*self.store, item_id, self.conflict_retries, |item| {
            ensure_owner(item.owner_id, owner_id, "Inventory item")?;
            if item.notarization_status == NotarizationStatus::Processing {
                return Err(AppError::InvalidStateTransition(
                    "Cannot unpublish while notarization is in progress".to_string(),
                ));
            }
            item.is_published = false;
            item.notarization_status = NotarizationStatus::None;
            Ok(())
        })
        .await?;

        tracing::info!(item_id = %item_id, "item unpublished");
        Ok(item.into())
    }

    /// Reset items a previous process left in `processing`.
    ///
    /// Run once at startup, before requests are served.
    pub async fn recover_interrupted(&self) -> AppResult<usize> {
        let stuck = self
            .store
            .list_items_by_status(NotarizationStatus::Processing)
            .await?;

        let mut recovered = 0;
        for item in stuck {
            let mut reset = false;
            update_item(&*self.store, item.id, self.conflict_retries, |item| {
                reset = item.notarization_status == NotarizationStatus::Processing;
                if reset {
                    item.notarization_status = NotarizationStatus::None;
                }
                Ok(())
            })
            .await?;

            if reset {
                tracing::warn!(item_id = %item.id, "interrupted notarization rolled back");
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// The ledger's record for one of the owner's items
    pub async fn ledger_record(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<LedgerRecordView> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
        ensure_owner(item.owner_id, owner_id, "Inventory item")?;

        let record = self.ledger.read_record(item_id).await?;
        Ok(LedgerRecordView::new(
            item.id,
            item.name,
            record,
            item.last_published_snapshot,
        ))
    }

    /// Ledger records of every owner item notarized at least once
    pub async fn ledger_explorer(&self, owner_id: Uuid) -> AppResult<Vec<LedgerRecordView>> {
        let items = self.store.list_items(owner_id).await?;

        let mut records = Vec::new();
        for item in items.into_iter().filter(|i| i.last_published_snapshot.is_some()) {
            let record = self.ledger.read_record(item.id).await?;
            if record.is_some() {
                records.push(LedgerRecordView::new(
                    item.id,
                    item.name,
                    record,
                    item.last_published_snapshot,
                ));
            }
        }
        Ok(records)
    }
}

/// Attempts at the `processing -> none` rollback, independent of the
/// configured conflict retries
const ROLLBACK_ATTEMPTS: u32 = 8;
const ROLLBACK_BACKOFF: Duration = Duration::from_millis(25);

/// Write back the outcome of a ledger call
async fn complete(
    store: &dyn RecordStore,
    item_id: Uuid,
    attempts: u32,
    snapshot: PublishedSnapshot,
    outcome: Result<NotarizationReceipt, LedgerError>,
) -> AppResult<InventoryItem> {
    let receipt = match outcome {
        Ok(receipt) => receipt,
        Err(err) => {
            tracing::warn!(item_id = %item_id, error = %err, "notarization failed, rolling back");
            roll_back(store, item_id).await;
            return Err(AppError::Ledger(err));
        }
    };

    // The snapshot holds the values sent, not whatever is live now
    let written = update_item(store, item_id, attempts, |item| {
        item.is_published = true;
        item.notarization_status = NotarizationStatus::Published;
        item.transaction_receipt = Some(receipt.transaction_hash.clone());
        item.last_synced_at = Some(Utc::now());
        item.last_published_snapshot = Some(snapshot);
        Ok(())
    })
    .await;

    match written {
        Ok(item) => {
            tracing::info!(
                item_id = %item_id,
                receipt = %receipt.transaction_hash,
                "notarization published"
            );
            Ok(item)
        }
        Err(err) => {
            tracing::error!(
                item_id = %item_id,
                receipt = %receipt.transaction_hash,
                error = %err,
                "notarized but write-back failed, rolling back"
            );
            roll_back(store, item_id).await;
            Err(err)
        }
    }
}

/// Move an item out of `processing`, retrying transient store failures.
///
/// Leaves any other status alone. Gives up on a missing item; an item still
/// stuck after every attempt is reset by `recover_interrupted` at startup.
async fn roll_back(store: &dyn RecordStore, item_id: Uuid) {
    for attempt in 1..=ROLLBACK_ATTEMPTS {
        let result = update_item(store, item_id, 1, |item| {
            if item.notarization_status == NotarizationStatus::Processing {
                item.notarization_status = NotarizationStatus::None;
            }
            Ok(())
        })
        .await;

        match result {
            Ok(_) => {
                tracing::info!(item_id = %item_id, attempt, "notarization rolled back");
                return;
            }
            Err(AppError::NotFound(_)) => return,
            Err(err) => {
                tracing::warn!(item_id = %item_id, attempt, error = %err, "rollback attempt failed");
                tokio::time::sleep(ROLLBACK_BACKOFF * attempt).await;
            }
        }
    }
    tracing::error!(item_id = %item_id, "notarization rollback failed; item left processing");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_matches_snapshot() {
        let snapshot = PublishedSnapshot {
            price_per_unit: Decimal::from(50),
            quantity: Decimal::from(10),
        };
        let record = NotarizedRecord {
            item_id: Uuid::nil(),
            price: 50,
            quantity: 10,
            notarized_by: "0xfarmer".to_string(),
            timestamp: 0,
        };

        let view = LedgerRecordView::new(Uuid::nil(), "Maize".into(), Some(record.clone()), Some(snapshot));
        assert!(view.matches_snapshot);

        let drifted = PublishedSnapshot {
            quantity: Decimal::from(7),
            ..snapshot
        };
        let view = LedgerRecordView::new(Uuid::nil(), "Maize".into(), Some(record), Some(drifted));
        assert!(!view.matches_snapshot);

        let view = LedgerRecordView::new(Uuid::nil(), "Maize".into(), None, Some(snapshot));
        assert!(!view.matches_snapshot);
    }
}
