//! Record store for inventory items and sale records
//!
//! Writes are grouped into a [`WriteBatch`] that the store applies
//! atomically. Every update or delete names the version it was computed
//! from; a stale version fails the whole batch with
//! [`AppError::ConcurrencyConflict`] and nothing is applied.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::{InventoryItem, NotarizationStatus, SaleRecord};
use std::future::Future;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;

/// Write to an inventory item
#[derive(Debug, Clone)]
pub enum ItemWrite {
    Insert(InventoryItem),
    /// Replace the stored item; `version` must match the stored version
    Update(InventoryItem),
    Delete { id: Uuid, expected_version: i64 },
}

/// Write to a sale record
#[derive(Debug, Clone)]
pub enum SaleWrite {
    Insert(SaleRecord),
    /// Replace the stored sale; `version` must match the stored version
    Update(SaleRecord),
    Delete { id: Uuid, expected_version: i64 },
}

/// Writes applied together or not at all. The item write is applied first.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub item: Option<ItemWrite>,
    pub sale: Option<SaleWrite>,
}

impl WriteBatch {
    pub fn item(write: ItemWrite) -> Self {
        Self {
            item: Some(write),
            sale: None,
        }
    }

    pub fn sale(write: SaleWrite) -> Self {
        Self {
            item: None,
            sale: Some(write),
        }
    }

    pub fn with_sale(mut self, write: SaleWrite) -> Self {
        self.sale = Some(write);
        self
    }
}

/// Persistent store for items and sales
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Connectivity probe
    async fn ping(&self) -> AppResult<()>;

    async fn get_item(&self, id: Uuid) -> AppResult<Option<InventoryItem>>;

    /// Items of one owner, most recently updated first
    async fn list_items(&self, owner_id: Uuid) -> AppResult<Vec<InventoryItem>>;

    /// Items currently exposed to buyers
    async fn list_published_items(&self) -> AppResult<Vec<InventoryItem>>;

    async fn list_items_by_status(
        &self,
        status: NotarizationStatus,
    ) -> AppResult<Vec<InventoryItem>>;

    async fn get_sale(&self, id: Uuid) -> AppResult<Option<SaleRecord>>;

    /// Sales of one owner, newest first
    async fn list_sales(&self, owner_id: Uuid) -> AppResult<Vec<SaleRecord>>;

    /// Apply a batch atomically
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;
}

/// Run `op` again from scratch while it fails on a stale version
pub async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < attempts => {
                tracing::debug!(attempt, error = %err, "retrying after concurrent modification");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Atomic read-modify-write of a single item.
///
/// `mutator` may reject the change by returning an error, in which case
/// nothing is written. Returns the item as stored.
pub async fn update_item<F>(
    store: &dyn RecordStore,
    id: Uuid,
    attempts: u32,
    mut mutator: F,
) -> AppResult<InventoryItem>
where
    F: FnMut(&mut InventoryItem) -> AppResult<()> + Send,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        let mut item = store
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
        mutator(&mut item)?;
        item.touch();

        match store.commit(WriteBatch::item(ItemWrite::Update(item.clone()))).await {
            Ok(()) => {
                item.version += 1;
                return Ok(item);
            }
            Err(err) if err.is_conflict() && attempt < attempts => {
                tracing::debug!(item_id = %id, attempt, "item changed underneath, re-reading");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
