//! In-memory record store
//!
//! Same semantics as the PostgreSQL store: batches are validated against the
//! stored versions first and only then applied, all under one lock.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{InventoryItem, NotarizationStatus, SaleRecord};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::{ItemWrite, RecordStore, SaleWrite, WriteBatch};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    items: HashMap<Uuid, InventoryItem>,
    sales: HashMap<Uuid, SaleRecord>,
}

/// In-memory implementation of [`RecordStore`] for tests and local runs
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::Internal("record store lock poisoned".to_string())
    }
}

fn stale(kind: &str, id: Uuid) -> AppError {
    AppError::ConcurrencyConflict(format!("{} {} was modified concurrently", kind, id))
}

fn check_version(kind: &str, id: Uuid, stored: Option<i64>, expected: i64) -> AppResult<()> {
    match stored {
        None => Err(AppError::NotFound(kind.to_string())),
        Some(version) if version != expected => Err(stale(kind, id)),
        Some(_) => Ok(()),
    }
}

fn check_item_invariants(item: &InventoryItem) -> AppResult<()> {
    if item.quantity < Decimal::ZERO {
        return Err(AppError::Validation {
            field: "quantity".to_string(),
            message: "must not be negative".to_string(),
        });
    }
    if item.price_per_unit < Decimal::ZERO {
        return Err(AppError::Validation {
            field: "price_per_unit".to_string(),
            message: "must not be negative".to_string(),
        });
    }
    Ok(())
}

impl Tables {
    fn validate(&self, batch: &WriteBatch) -> AppResult<()> {
        match &batch.item {
            Some(ItemWrite::Insert(item)) => {
                check_item_invariants(item)?;
                if self.items.contains_key(&item.id) {
                    return Err(stale("Inventory item", item.id));
                }
            }
            Some(ItemWrite::Update(item)) => {
                check_item_invariants(item)?;
                let stored = self.items.get(&item.id).map(|i| i.version);
                check_version("Inventory item", item.id, stored, item.version)?;
            }
            Some(ItemWrite::Delete { id, expected_version }) => {
                let stored = self.items.get(id).map(|i| i.version);
                check_version("Inventory item", *id, stored, *expected_version)?;
            }
            None => {}
        }

        match &batch.sale {
            Some(SaleWrite::Insert(sale)) => {
                if self.sales.contains_key(&sale.id) {
                    return Err(stale("Sale record", sale.id));
                }
            }
            Some(SaleWrite::Update(sale)) => {
                let stored = self.sales.get(&sale.id).map(|s| s.version);
                check_version("Sale record", sale.id, stored, sale.version)?;
            }
            Some(SaleWrite::Delete { id, expected_version }) => {
                let stored = self.sales.get(id).map(|s| s.version);
                check_version("Sale record", *id, stored, *expected_version)?;
            }
            None => {}
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) {
        match batch.item {
            Some(ItemWrite::Insert(item)) => {
                self.items.insert(item.id, item);
            }
            Some(ItemWrite::Update(mut item)) => {
                item.version += 1;
                self.items.insert(item.id, item);
            }
            Some(ItemWrite::Delete { id, .. }) => {
                self.items.remove(&id);
                // Mirrors ON DELETE SET NULL
                for sale in self.sales.values_mut() {
                    if sale.inventory_item_id == Some(id) {
                        sale.inventory_item_id = None;
                    }
                }
            }
            None => {}
        }

        match batch.sale {
            Some(SaleWrite::Insert(sale)) => {
                self.sales.insert(sale.id, sale);
            }
            Some(SaleWrite::Update(mut sale)) => {
                // Link and baseline are never rewritten, as in the SQL UPDATE
                if let Some(stored) = self.sales.get(&sale.id) {
                    sale.inventory_item_id = stored.inventory_item_id;
                    sale.baseline = stored.baseline;
                }
                sale.version += 1;
                self.sales.insert(sale.id, sale);
            }
            Some(SaleWrite::Delete { id, .. }) => {
                self.sales.remove(&id);
            }
            None => {}
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn ping(&self) -> AppResult<()> {
        self.tables.read().map_err(Self::poisoned)?;
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<InventoryItem>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        Ok(tables.items.get(&id).cloned())
    }

    async fn list_items(&self, owner_id: Uuid) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    async fn list_published_items(&self) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|i| i.is_published)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    async fn list_items_by_status(
        &self,
        status: NotarizationStatus,
    ) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        Ok(tables
            .items
            .values()
            .filter(|i| i.notarization_status == status)
            .cloned()
            .collect())
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Option<SaleRecord>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        Ok(tables.sales.get(&id).cloned())
    }

    async fn list_sales(&self, owner_id: Uuid) -> AppResult<Vec<SaleRecord>> {
        let tables = self.tables.read().map_err(Self::poisoned)?;
        let mut sales: Vec<_> = tables
            .sales
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        let mut tables = self.tables.write().map_err(Self::poisoned)?;
        tables.validate(&batch)?;
        tables.apply(batch);
        Ok(())
    }
}
