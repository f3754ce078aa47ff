//! PostgreSQL record store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Buyer, InventoryItem, NotarizationStatus, PublishedSnapshot, SaleBaseline, SaleRecord,
};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ItemWrite, RecordStore, SaleWrite, WriteBatch};
use crate::error::{AppError, AppResult};

const ITEM_COLUMNS: &str = r#"
    id, owner_id, name, category, unit, quantity, price_per_unit, is_published,
    notarization_status, snapshot_price_per_unit, snapshot_quantity, last_synced_at,
    transaction_receipt, version, created_at, updated_at
"#;

const SALE_COLUMNS: &str = r#"
    id, owner_id, inventory_item_id, product_name, category, unit, sale_date,
    stock_before_sale, unit_price_at_cost, valuation_before_sale, buyers,
    version, created_at, updated_at
"#;

/// Record store backed by PostgreSQL
#[derive(Clone)]
pub struct PgRecordStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    category: String,
    unit: String,
    quantity: Decimal,
    price_per_unit: Decimal,
    is_published: bool,
    notarization_status: String,
    snapshot_price_per_unit: Option<Decimal>,
    snapshot_quantity: Option<Decimal>,
    last_synced_at: Option<DateTime<Utc>>,
    transaction_receipt: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let notarization_status = NotarizationStatus::parse(&row.notarization_status)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "unknown notarization status '{}' on item {}",
                    row.notarization_status, row.id
                ))
            })?;

        let last_published_snapshot = match (row.snapshot_price_per_unit, row.snapshot_quantity) {
            (Some(price_per_unit), Some(quantity)) => Some(PublishedSnapshot {
                price_per_unit,
                quantity,
            }),
            _ => None,
        };

        Ok(InventoryItem {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            category: row.category,
            unit: row.unit,
            quantity: row.quantity,
            price_per_unit: row.price_per_unit,
            is_published: row.is_published,
            notarization_status,
            last_published_snapshot,
            last_synced_at: row.last_synced_at,
            transaction_receipt: row.transaction_receipt,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    owner_id: Uuid,
    inventory_item_id: Option<Uuid>,
    product_name: String,
    category: String,
    unit: String,
    sale_date: NaiveDate,
    stock_before_sale: Option<Decimal>,
    unit_price_at_cost: Option<Decimal>,
    valuation_before_sale: Option<Decimal>,
    buyers: Json<Vec<Buyer>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SaleRow> for SaleRecord {
    fn from(row: SaleRow) -> Self {
        let baseline = match (
            row.stock_before_sale,
            row.unit_price_at_cost,
            row.valuation_before_sale,
        ) {
            (Some(stock_before_sale), Some(unit_price_at_cost), Some(valuation_before_sale)) => {
                Some(SaleBaseline {
                    stock_before_sale,
                    unit_price_at_cost,
                    valuation_before_sale,
                })
            }
            _ => None,
        };

        SaleRecord {
            id: row.id,
            owner_id: row.owner_id,
            inventory_item_id: row.inventory_item_id,
            product_name: row.product_name,
            category: row.category,
            unit: row.unit,
            sale_date: row.sale_date,
            baseline,
            buyers: row.buyers.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgRecordStore {
    /// Create a new PgRecordStore
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_items(&self, filter: &str, bind: Option<String>) -> AppResult<Vec<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items {} ORDER BY updated_at DESC",
            ITEM_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<_, ItemRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        query
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(InventoryItem::try_from)
            .collect()
    }

    /// Distinguish a missing row from a stale version after an update
    /// matched nothing
    async fn missed_write(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        kind: &str,
        id: Uuid,
    ) -> AppError {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table);
        match sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
        {
            Ok(true) => AppError::ConcurrencyConflict(format!(
                "{} {} was modified concurrently",
                kind, id
            )),
            Ok(false) => AppError::NotFound(kind.to_string()),
            Err(e) => AppError::DatabaseError(e),
        }
    }

    async fn write_item(tx: &mut Transaction<'_, Postgres>, write: ItemWrite) -> AppResult<()> {
        match write {
            ItemWrite::Insert(item) => {
                let snapshot = item.last_published_snapshot;
                sqlx::query(
                    r#"
                    INSERT INTO inventory_items (
                        id, owner_id, name, category, unit, quantity, price_per_unit,
                        is_published, notarization_status, snapshot_price_per_unit,
                        snapshot_quantity, last_synced_at, transaction_receipt, version,
                        created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(item.id)
                .bind(item.owner_id)
                .bind(&item.name)
                .bind(&item.category)
                .bind(&item.unit)
                .bind(item.quantity)
                .bind(item.price_per_unit)
                .bind(item.is_published)
                .bind(item.notarization_status.as_str())
                .bind(snapshot.map(|s| s.price_per_unit))
                .bind(snapshot.map(|s| s.quantity))
                .bind(item.last_synced_at)
                .bind(&item.transaction_receipt)
                .bind(item.version)
                .bind(item.created_at)
                .bind(item.updated_at)
                .execute(&mut **tx)
                .await?;
            }
            ItemWrite::Update(item) => {
                let snapshot = item.last_published_snapshot;
                let result = sqlx::query(
                    r#"
                    UPDATE inventory_items
                    SET name = $3, category = $4, unit = $5, quantity = $6, price_per_unit = $7,
                        is_published = $8, notarization_status = $9,
                        snapshot_price_per_unit = $10, snapshot_quantity = $11,
                        last_synced_at = $12, transaction_receipt = $13,
                        updated_at = $14, version = version + 1
                    WHERE id = $1 AND version = $2
                    "#,
                )
                .bind(item.id)
                .bind(item.version)
                .bind(&item.name)
                .bind(&item.category)
                .bind(&item.unit)
                .bind(item.quantity)
                .bind(item.price_per_unit)
                .bind(item.is_published)
                .bind(item.notarization_status.as_str())
                .bind(snapshot.map(|s| s.price_per_unit))
                .bind(snapshot.map(|s| s.quantity))
                .bind(item.last_synced_at)
                .bind(&item.transaction_receipt)
                .bind(item.updated_at)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(Self::missed_write(tx, "inventory_items", "Inventory item", item.id).await);
                }
            }
            ItemWrite::Delete {
                id,
                expected_version,
            } => {
                let result =
                    sqlx::query("DELETE FROM inventory_items WHERE id = $1 AND version = $2")
                        .bind(id)
                        .bind(expected_version)
                        .execute(&mut **tx)
                        .await?;

                if result.rows_affected() == 0 {
                    return Err(Self::missed_write(tx, "inventory_items", "Inventory item", id).await);
                }
            }
        }
        Ok(())
    }

    async fn write_sale(tx: &mut Transaction<'_, Postgres>, write: SaleWrite) -> AppResult<()> {
        match write {
            SaleWrite::Insert(sale) => {
                let baseline = sale.baseline;
                sqlx::query(
                    r#"
                    INSERT INTO sale_records (
                        id, owner_id, inventory_item_id, product_name, category, unit, sale_date,
                        stock_before_sale, unit_price_at_cost, valuation_before_sale, buyers,
                        total_quantity_sold, total_amount_received, version, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(sale.id)
                .bind(sale.owner_id)
                .bind(sale.inventory_item_id)
                .bind(&sale.product_name)
                .bind(&sale.category)
                .bind(&sale.unit)
                .bind(sale.sale_date)
                .bind(baseline.map(|b| b.stock_before_sale))
                .bind(baseline.map(|b| b.unit_price_at_cost))
                .bind(baseline.map(|b| b.valuation_before_sale))
                .bind(Json(&sale.buyers))
                .bind(sale.total_quantity_sold())
                .bind(sale.total_amount_received())
                .bind(sale.version)
                .bind(sale.created_at)
                .bind(sale.updated_at)
                .execute(&mut **tx)
                .await?;
            }
            SaleWrite::Update(sale) => {
                // Link and baseline are fixed at creation and never rewritten
                let result = sqlx::query(
                    r#"
                    UPDATE sale_records
                    SET product_name = $3, category = $4, unit = $5, sale_date = $6,
                        buyers = $7, total_quantity_sold = $8, total_amount_received = $9,
                        updated_at = $10, version = version + 1
                    WHERE id = $1 AND version = $2
                    "#,
                )
                .bind(sale.id)
                .bind(sale.version)
                .bind(&sale.product_name)
                .bind(&sale.category)
                .bind(&sale.unit)
                .bind(sale.sale_date)
                .bind(Json(&sale.buyers))
                .bind(sale.total_quantity_sold())
                .bind(sale.total_amount_received())
                .bind(sale.updated_at)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(Self::missed_write(tx, "sale_records", "Sale record", sale.id).await);
                }
            }
            SaleWrite::Delete {
                id,
                expected_version,
            } => {
                let result = sqlx::query("DELETE FROM sale_records WHERE id = $1 AND version = $2")
                    .bind(id)
                    .bind(expected_version)
                    .execute(&mut **tx)
                    .await?;

                if result.rows_affected() == 0 {
                    return Err(Self::missed_write(tx, "sale_records", "Sale record", id).await);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<InventoryItem>> {
        let sql = format!("SELECT {} FROM inventory_items WHERE id = $1", ITEM_COLUMNS);
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(InventoryItem::try_from)
            .transpose()
    }

    async fn list_items(&self, owner_id: Uuid) -> AppResult<Vec<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE owner_id = $1 ORDER BY updated_at DESC",
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(InventoryItem::try_from)
            .collect()
    }

    async fn list_published_items(&self) -> AppResult<Vec<InventoryItem>> {
        self.fetch_items("WHERE is_published = TRUE", None).await
    }

    async fn list_items_by_status(
        &self,
        status: NotarizationStatus,
    ) -> AppResult<Vec<InventoryItem>> {
        self.fetch_items(
            "WHERE notarization_status = $1",
            Some(status.as_str().to_string()),
        )
        .await
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Option<SaleRecord>> {
        let sql = format!("SELECT {} FROM sale_records WHERE id = $1", SALE_COLUMNS);
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(SaleRecord::from))
    }

    async fn list_sales(&self, owner_id: Uuid) -> AppResult<Vec<SaleRecord>> {
        let sql = format!(
            "SELECT {} FROM sale_records WHERE owner_id = $1 ORDER BY created_at DESC",
            SALE_COLUMNS
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(SaleRecord::from).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        if let Some(write) = batch.item {
            Self::write_item(&mut tx, write).await?;
        }
        if let Some(write) = batch.sale {
            Self::write_sale(&mut tx, write).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
