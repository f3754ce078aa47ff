//! Sale reconciliation
//!
//! A sale linked to an inventory item moves that item's quantity. Create
//! subtracts from the captured baseline, update restores the old sale's
//! quantity before applying the new one, delete restores it. Item and sale
//! are committed together in one batch, so a rejected or conflicting
//! operation leaves both untouched.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    quantity_after_edit, quantity_after_removal, quantity_after_sale, total_quantity,
    validate_buyers, validate_required_text, Buyer, InventoryItem, SaleBaseline, SaleRecord,
};
use std::sync::Arc;
use uuid::Uuid;

use super::ensure_owner;
use crate::error::{AppError, AppResult};
use crate::store::{retry_on_conflict, ItemWrite, RecordStore, SaleWrite, WriteBatch};

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    store: Arc<dyn RecordStore>,
    conflict_retries: u32,
}

/// Input for recording a sale
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSaleInput {
    /// Absent for a manual sale that touches no inventory
    pub inventory_item_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub sale_date: Option<NaiveDate>,
    pub buyers: Vec<Buyer>,
    /// Sell more than the recorded stock, leaving the item at zero
    #[serde(default)]
    pub allow_overdraw: bool,
}

/// Input for editing a sale. The item link is fixed at creation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSaleInput {
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub sale_date: Option<NaiveDate>,
    pub buyers: Vec<Buyer>,
}

/// Sale with its derived totals
#[derive(Debug, Clone, Serialize)]
pub struct SaleView {
    #[serde(flatten)]
    pub sale: SaleRecord,
    pub total_quantity_sold: Decimal,
    pub total_amount_received: Decimal,
}

impl From<SaleRecord> for SaleView {
    fn from(sale: SaleRecord) -> Self {
        Self {
            total_quantity_sold: sale.total_quantity_sold(),
            total_amount_received: sale.total_amount_received(),
            sale,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesTotal {
    pub total_amount_received: Decimal,
    pub sale_count: usize,
}

/// Provided text wins over the fallback; blank provided text is rejected
fn descriptive(
    field: &str,
    provided: Option<&String>,
    fallback: Option<&str>,
) -> AppResult<String> {
    match (provided, fallback) {
        (Some(value), _) => {
            validate_required_text(field, value)?;
            Ok(value.trim().to_string())
        }
        (None, Some(fallback)) => Ok(fallback.to_string()),
        (None, None) => Err(AppError::Validation {
            field: field.to_string(),
            message: "is required".to_string(),
        }),
    }
}

fn log_reconciliation(item: &InventoryItem, old_quantity: Decimal, sale_id: Uuid, action: &str) {
    tracing::info!(
        item_id = %item.id,
        sale_id = %sale_id,
        old_quantity = %old_quantity,
        new_quantity = %item.quantity,
        action,
        "stock reconciled"
    );
}

impl SaleService {
    /// Create a new SaleService instance
    pub fn new(store: Arc<dyn RecordStore>, conflict_retries: u32) -> Self {
        Self {
            store,
            conflict_retries,
        }
    }

    /// Record a sale, drawing its quantity from the linked item if any
    pub async fn create_sale(&self, owner_id: Uuid, input: CreateSaleInput) -> AppResult<SaleView> {
        validate_buyers(&input.buyers)?;

        let input = &input;
        let sale = retry_on_conflict(self.conflict_retries, move || {
            self.try_create_sale(owner_id, input)
        })
        .await?;
        Ok(sale.into())
    }

    async fn try_create_sale(
        &self,
        owner_id: Uuid,
        input: &CreateSaleInput,
    ) -> AppResult<SaleRecord> {
        let now = Utc::now();
        let mut sale = SaleRecord {
            id: Uuid::new_v4(),
            owner_id,
            inventory_item_id: input.inventory_item_id,
            product_name: String::new(),
            category: String::new(),
            unit: String::new(),
            sale_date: input.sale_date.unwrap_or_else(|| now.date_naive()),
            baseline: None,
            buyers: input.buyers.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let Some(item_id) = input.inventory_item_id else {
            sale.product_name = descriptive("product_name", input.product_name.as_ref(), None)?;
            sale.category = descriptive("category", input.category.as_ref(), None)?;
            sale.unit = descriptive("unit", input.unit.as_ref(), None)?;

            self.store
                .commit(WriteBatch::sale(SaleWrite::Insert(sale.clone())))
                .await?;
            tracing::info!(sale_id = %sale.id, "manual sale recorded");
            return Ok(sale);
        };

        let mut item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
        ensure_owner(item.owner_id, owner_id, "Inventory item")?;

        sale.product_name = descriptive(
            "product_name",
            input.product_name.as_ref(),
            Some(item.name.as_str()),
        )?;
        sale.category = descriptive(
            "category",
            input.category.as_ref(),
            Some(item.category.as_str()),
        )?;
        sale.unit = descriptive("unit", input.unit.as_ref(), Some(item.unit.as_str()))?;

        let baseline = SaleBaseline {
            stock_before_sale: item.quantity,
            unit_price_at_cost: item.price_per_unit,
            valuation_before_sale: item.total_value(),
        };
        sale.baseline = Some(baseline);

        let old_quantity = item.quantity;
        item.quantity = quantity_after_sale(
            baseline.stock_before_sale,
            sale.total_quantity_sold(),
            input.allow_overdraw,
        )?;
        item.touch();

        let batch = WriteBatch::item(ItemWrite::Update(item.clone()))
            .with_sale(SaleWrite::Insert(sale.clone()));
        self.store.commit(batch).await?;

        log_reconciliation(&item, old_quantity, sale.id, "create");
        Ok(sale)
    }

    /// Replace a sale's buyers and descriptive fields
    pub async fn update_sale(
        &self,
        owner_id: Uuid,
        sale_id: Uuid,
        input: UpdateSaleInput,
    ) -> AppResult<SaleView> {
        validate_buyers(&input.buyers)?;

        let input = &input;
        let sale = retry_on_conflict(self.conflict_retries, move || {
            self.try_update_sale(owner_id, sale_id, input)
        })
        .await?;
        Ok(sale.into())
    }

    async fn try_update_sale(
        &self,
        owner_id: Uuid,
        sale_id: Uuid,
        input: &UpdateSaleInput,
    ) -> AppResult<SaleRecord> {
        let old_sale = self.owned_sale(owner_id, sale_id).await?;

        let mut sale = old_sale.clone();
        sale.product_name = descriptive(
            "product_name",
            input.product_name.as_ref(),
            Some(old_sale.product_name.as_str()),
        )?;
        sale.category = descriptive(
            "category",
            input.category.as_ref(),
            Some(old_sale.category.as_str()),
        )?;
        sale.unit = descriptive(
            "unit",
            input.unit.as_ref(),
            Some(old_sale.unit.as_str()),
        )?;
        if let Some(sale_date) = input.sale_date {
            sale.sale_date = sale_date;
        }
        sale.buyers = input.buyers.clone();
        sale.updated_at = Utc::now();

        let mut batch = WriteBatch::sale(SaleWrite::Update(sale.clone()));
        let mut reconciled = None;

        let linked = self.linked_item(&old_sale).await?;
        if linked.is_none() {
            // Item deleted since the sale was read; the store has cleared the link
            sale.inventory_item_id = None;
        }
        if let Some(mut item) = linked {
            let old_quantity = item.quantity;
            item.quantity = quantity_after_edit(
                item.quantity,
                old_sale.total_quantity_sold(),
                total_quantity(&sale.buyers),
            )?;
            item.touch();
            batch.item = Some(ItemWrite::Update(item.clone()));
            reconciled = Some((item, old_quantity));
        }

        self.store.commit(batch).await?;
        if let Some((item, old_quantity)) = reconciled {
            log_reconciliation(&item, old_quantity, sale.id, "update");
        }

        sale.version += 1;
        Ok(sale)
    }

    /// Delete a sale, returning its quantity to the linked item
    pub async fn delete_sale(&self, owner_id: Uuid, sale_id: Uuid) -> AppResult<()> {
        retry_on_conflict(self.conflict_retries, move || {
            self.try_delete_sale(owner_id, sale_id)
        })
        .await
    }

    async fn try_delete_sale(&self, owner_id: Uuid, sale_id: Uuid) -> AppResult<()> {
        let sale = self.owned_sale(owner_id, sale_id).await?;

        let mut batch = WriteBatch::sale(SaleWrite::Delete {
            id: sale.id,
            expected_version: sale.version,
        });
        let mut reconciled = None;

        if let Some(mut item) = self.linked_item(&sale).await? {
            let old_quantity = item.quantity;
            item.quantity = quantity_after_removal(item.quantity, sale.total_quantity_sold())?;
            item.touch();
            batch.item = Some(ItemWrite::Update(item.clone()));
            reconciled = Some((item, old_quantity));
        }

        self.store.commit(batch).await?;
        match reconciled {
            Some((item, old_quantity)) => {
                log_reconciliation(&item, old_quantity, sale.id, "delete")
            }
            None => tracing::info!(sale_id = %sale.id, "sale deleted"),
        }
        Ok(())
    }

    /// Get one of the owner's sales
    pub async fn get_sale(&self, owner_id: Uuid, sale_id: Uuid) -> AppResult<SaleView> {
        let sale = self.owned_sale(owner_id, sale_id).await?;
        Ok(sale.into())
    }

    /// Sales history, newest first
    pub async fn list_sales(&self, owner_id: Uuid) -> AppResult<Vec<SaleView>> {
        let sales = self.store.list_sales(owner_id).await?;
        Ok(sales.into_iter().map(SaleView::from).collect())
    }

    /// Total received across the owner's sales
    pub async fn total_sales(&self, owner_id: Uuid) -> AppResult<SalesTotal> {
        let sales = self.store.list_sales(owner_id).await?;
        Ok(SalesTotal {
            total_amount_received: sales.iter().fold(Decimal::ZERO, |sum, sale| {
                sum.saturating_add(sale.total_amount_received())
            }),
            sale_count: sales.len(),
        })
    }

    async fn owned_sale(&self, owner_id: Uuid, sale_id: Uuid) -> AppResult<SaleRecord> {
        let sale = self
            .store
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale record".to_string()))?;
        ensure_owner(sale.owner_id, owner_id, "Sale record")?;
        Ok(sale)
    }

    /// The sale's item, if it is linked and the item still exists
    async fn linked_item(&self, sale: &SaleRecord) -> AppResult<Option<InventoryItem>> {
        match sale.inventory_item_id {
            Some(item_id) => self.store.get_item(item_id).await,
            None => Ok(None),
        }
    }
}
