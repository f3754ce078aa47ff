//! Inventory service: item CRUD, dashboard figures and the public marketplace

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    sync_status, validate_amount, validate_required_text, DashboardStats, InventoryItem,
    PublishedSnapshot, SyncEvaluation,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::ensure_owner;
use crate::error::{AppError, AppResult};
use crate::store::{update_item, ItemWrite, RecordStore, WriteBatch};

/// Inventory service for managing a farmer's items
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn RecordStore>,
    conflict_retries: u32,
}

/// Input for creating an inventory item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub category: String,
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub unit: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
}

/// Input for editing an inventory item
///
/// Publication state is not editable here; a changed price or quantity
/// leaves a published item out of sync until it is published again.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    /// Version the caller last saw; a newer stored version fails the edit
    pub expected_version: Option<i64>,
}

/// Item with its derived values
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub total_value: Decimal,
    pub sync: SyncEvaluation,
}

impl From<InventoryItem> for ItemView {
    fn from(item: InventoryItem) -> Self {
        Self {
            total_value: item.total_value(),
            sync: sync_status::evaluate(&item),
            item,
        }
    }
}

/// Published item as shown to buyers
#[derive(Debug, Clone, Serialize)]
pub struct MarketplaceListing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub price_per_unit: Decimal,
    pub quantity: Decimal,
    pub total_value: Decimal,
    /// Values as last notarized
    pub verified: Option<PublishedSnapshot>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub transaction_receipt: Option<String>,
    pub sync: SyncEvaluation,
}

impl From<InventoryItem> for MarketplaceListing {
    fn from(item: InventoryItem) -> Self {
        Self {
            sync: sync_status::evaluate(&item),
            total_value: item.total_value(),
            id: item.id,
            owner_id: item.owner_id,
            name: item.name,
            category: item.category,
            unit: item.unit,
            price_per_unit: item.price_per_unit,
            quantity: item.quantity,
            verified: item.last_published_snapshot,
            last_synced_at: item.last_synced_at,
            transaction_receipt: item.transaction_receipt,
        }
    }
}

fn validate_text(field: &str, value: &str) -> AppResult<()> {
    validate_required_text(field, value)?;
    Ok(())
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(store: Arc<dyn RecordStore>, conflict_retries: u32) -> Self {
        Self {
            store,
            conflict_retries,
        }
    }

    /// Create an item; it starts unpublished with no snapshot
    pub async fn create_item(&self, owner_id: Uuid, input: CreateItemInput) -> AppResult<ItemView> {
        input.validate()?;
        validate_text("name", &input.name)?;
        validate_text("category", &input.category)?;
        validate_text("unit", &input.unit)?;
        validate_amount("quantity", input.quantity)?;
        validate_amount("price_per_unit", input.price_per_unit)?;

        let item = InventoryItem::new(
            owner_id,
            input.name.trim(),
            input.category.trim(),
            input.unit.trim(),
            input.quantity,
            input.price_per_unit,
        );

        self.store
            .commit(WriteBatch::item(ItemWrite::Insert(item.clone())))
            .await?;

        tracing::info!(item_id = %item.id, owner_id = %owner_id, "inventory item created");
        Ok(item.into())
    }

    /// Get one of the owner's items
    pub async fn get_item(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<ItemView> {
        let item = self.owned_item(owner_id, item_id).await?;
        Ok(item.into())
    }

    /// List the owner's items, most recently updated first
    pub async fn list_items(&self, owner_id: Uuid) -> AppResult<Vec<ItemView>> {
        let items = self.store.list_items(owner_id).await?;
        Ok(items.into_iter().map(ItemView::from).collect())
    }

    /// Edit descriptive fields, price or quantity
    pub async fn edit_item(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<ItemView> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_text("name", name)?;
        }
        if let Some(category) = &input.category {
            validate_text("category", category)?;
        }
        if let Some(unit) = &input.unit {
            validate_text("unit", unit)?;
        }
        if let Some(quantity) = input.quantity {
            validate_amount("quantity", quantity)?;
        }
        if let Some(price) = input.price_per_unit {
            validate_amount("price_per_unit", price)?;
        }

        let item = update_item(&*self.store, item_id, self.conflict_retries, |item| {
            ensure_owner(item.owner_id, owner_id, "Inventory item")?;
            if let Some(expected) = input.expected_version {
                if expected != item.version {
                    return Err(AppError::ConcurrencyConflict(format!(
                        "Inventory item {} changed since version {}",
                        item_id, expected
                    )));
                }
            }

            if let Some(name) = &input.name {
                item.name = name.trim().to_string();
            }
            if let Some(category) = &input.category {
                item.category = category.trim().to_string();
            }
            if let Some(unit) = &input.unit {
                item.unit = unit.trim().to_string();
            }
            if let Some(quantity) = input.quantity {
                item.quantity = quantity;
            }
            if let Some(price) = input.price_per_unit {
                item.price_per_unit = price;
            }
            Ok(())
        })
        .await?;

        tracing::info!(
            item_id = %item.id,
            quantity = %item.quantity,
            price_per_unit = %item.price_per_unit,
            "inventory item edited"
        );
        Ok(item.into())
    }

    /// Delete an item; its sales keep their records but lose the link
    pub async fn delete_item(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let attempts = self.conflict_retries.max(1);
        let mut attempt = 1;
        loop {
            let item = self.owned_item(owner_id, item_id).await?;
            let write = ItemWrite::Delete {
                id: item.id,
                expected_version: item.version,
            };

            match self.store.commit(WriteBatch::item(write)).await {
                Ok(()) => {
                    tracing::info!(item_id = %item_id, "inventory item deleted");
                    return Ok(());
                }
                Err(err) if err.is_conflict() && attempt < attempts => attempt += 1,
                Err(err) => return Err(err),
            }
        }
    }

    /// Dashboard figures over the owner's items
    pub async fn dashboard_stats(&self, owner_id: Uuid) -> AppResult<DashboardStats> {
        let items = self.store.list_items(owner_id).await?;
        Ok(DashboardStats::from_items(&items))
    }

    /// Published items of every owner
    pub async fn marketplace_listing(&self) -> AppResult<Vec<MarketplaceListing>> {
        let items = self.store.list_published_items().await?;
        Ok(items.into_iter().map(MarketplaceListing::from).collect())
    }

    /// A single published item
    pub async fn marketplace_item(&self, item_id: Uuid) -> AppResult<MarketplaceListing> {
        match self.store.get_item(item_id).await? {
            Some(item) if item.is_published => Ok(item.into()),
            _ => Err(AppError::NotFound("Listing".to_string())),
        }
    }

    async fn owned_item(&self, owner_id: Uuid, item_id: Uuid) -> AppResult<InventoryItem> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
        ensure_owner(item.owner_id, owner_id, "Inventory item")?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use shared::{NotarizationStatus, SyncStatus};

    fn service() -> InventoryService {
        InventoryService::new(Arc::new(InMemoryRecordStore::new()), 3)
    }

    fn maize() -> CreateItemInput {
        CreateItemInput {
            name: "Maize".to_string(),
            category: "Grains".to_string(),
            unit: "bags".to_string(),
            quantity: Decimal::from(40),
            price_per_unit: Decimal::from(12),
        }
    }

    #[tokio::test]
    async fn test_create_item_starts_unpublished() {
        let svc = service();
        let view = svc.create_item(Uuid::new_v4(), maize()).await.unwrap();

        assert!(!view.item.is_published);
        assert_eq!(view.item.notarization_status, NotarizationStatus::None);
        assert_eq!(view.item.last_published_snapshot, None);
        assert_eq!(view.total_value, Decimal::from(480));
        assert_eq!(view.sync.status, SyncStatus::None);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_price() {
        let svc = service();
        let mut input = maize();
        input.price_per_unit = Decimal::from(-1);

        let err = svc.create_item(Uuid::new_v4(), input).await.unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "price_per_unit"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected_before_any_write() {
        let svc = service();
        let owner = Uuid::new_v4();
        let huge = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let mut input = maize();
        input.quantity = huge;
        input.price_per_unit = huge;

        let err = svc.create_item(owner, input).await.unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "quantity"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(svc.list_items(owner).await.unwrap().is_empty());
        assert_eq!(svc.dashboard_stats(owner).await.unwrap().item_count, 0);

        let view = svc.create_item(owner, maize()).await.unwrap();
        let err = svc
            .edit_item(
                owner,
                view.item.id,
                UpdateItemInput {
                    price_per_unit: Some(huge),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            svc.get_item(owner, view.item.id).await.unwrap().total_value,
            Decimal::from(480)
        );
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let svc = service();
        let mut input = maize();
        input.name = "   ".to_string();

        let err = svc.create_item(Uuid::new_v4(), input).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_other_owner_sees_not_found() {
        let svc = service();
        let view = svc.create_item(Uuid::new_v4(), maize()).await.unwrap();

        let err = svc.get_item(Uuid::new_v4(), view.item.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_a_conflict() {
        let svc = service();
        let owner = Uuid::new_v4();
        let view = svc.create_item(owner, maize()).await.unwrap();

        svc.edit_item(
            owner,
            view.item.id,
            UpdateItemInput {
                quantity: Some(Decimal::from(30)),
                expected_version: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = svc
            .edit_item(
                owner,
                view.item.id,
                UpdateItemInput {
                    quantity: Some(Decimal::from(20)),
                    expected_version: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let current = svc.get_item(owner, view.item.id).await.unwrap();
        assert_eq!(current.item.quantity, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let svc = service();
        let owner = Uuid::new_v4();
        svc.create_item(owner, maize()).await.unwrap();
        let mut beans = maize();
        beans.name = "Beans".to_string();
        beans.quantity = Decimal::from(10);
        beans.price_per_unit = Decimal::from(5);
        svc.create_item(owner, beans).await.unwrap();
        svc.create_item(Uuid::new_v4(), maize()).await.unwrap();

        let stats = svc.dashboard_stats(owner).await.unwrap();
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.total_quantity, Decimal::from(50));
        assert_eq!(stats.total_value, Decimal::from(530));
        assert_eq!(stats.active_listings, 0);
    }

    #[tokio::test]
    async fn test_unpublished_item_hidden_from_marketplace() {
        let svc = service();
        let view = svc.create_item(Uuid::new_v4(), maize()).await.unwrap();

        assert!(svc.marketplace_listing().await.unwrap().is_empty());
        assert!(matches!(
            svc.marketplace_item(view.item.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
