//! Sale record models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One buyer's share of a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub quantity: Decimal,
    pub amount_paid: Decimal,
}

/// Stock figures captured when a linked sale is created.
///
/// These never change afterwards; later edits of the sale reconcile against
/// the item's current quantity, not against this baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleBaseline {
    pub stock_before_sale: Decimal,
    pub unit_price_at_cost: Decimal,
    pub valuation_before_sale: Decimal,
}

/// A recorded sale, optionally tied to an inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Absent for manual sales, which never touch inventory
    pub inventory_item_id: Option<Uuid>,
    pub product_name: String,
    pub category: String,
    pub unit: String,
    pub sale_date: NaiveDate,
    pub baseline: Option<SaleBaseline>,
    pub buyers: Vec<Buyer>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleRecord {
    pub fn total_quantity_sold(&self) -> Decimal {
        total_quantity(&self.buyers)
    }

    pub fn total_amount_received(&self) -> Decimal {
        total_amount(&self.buyers)
    }

    pub fn is_manual(&self) -> bool {
        self.inventory_item_id.is_none()
    }
}

/// Sum of quantities across a buyer list, saturating at `Decimal::MAX`
pub fn total_quantity(buyers: &[Buyer]) -> Decimal {
    buyers
        .iter()
        .fold(Decimal::ZERO, |sum, b| sum.saturating_add(b.quantity))
}

/// Sum of amounts across a buyer list, saturating at `Decimal::MAX`
pub fn total_amount(buyers: &[Buyer]) -> Decimal {
    buyers
        .iter()
        .fold(Decimal::ZERO, |sum, b| sum.saturating_add(b.amount_paid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer(quantity: Decimal, amount_paid: Decimal) -> Buyer {
        Buyer {
            name: "Ama".to_string(),
            quantity,
            amount_paid,
        }
    }

    #[test]
    fn test_buyer_totals() {
        let buyers = vec![
            buyer(Decimal::from(20), Decimal::from(10_000)),
            buyer(Decimal::from(15), Decimal::from(7_500)),
        ];
        assert_eq!(total_quantity(&buyers), Decimal::from(35));
        assert_eq!(total_amount(&buyers), Decimal::from(17_500));
    }

    #[test]
    fn test_buyer_totals_saturate() {
        let buyers = vec![buyer(Decimal::MAX, Decimal::MAX), buyer(Decimal::MAX, Decimal::ONE)];
        assert_eq!(total_quantity(&buyers), Decimal::MAX);
        assert_eq!(total_amount(&buyers), Decimal::MAX);
    }
}
