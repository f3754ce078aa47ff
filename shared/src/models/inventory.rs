//! Inventory item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an item sits in the notarization workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotarizationStatus {
    #[default]
    None,
    Processing,
    Published,
}

impl NotarizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotarizationStatus::None => "none",
            NotarizationStatus::Processing => "processing",
            NotarizationStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(NotarizationStatus::None),
            "processing" => Some(NotarizationStatus::Processing),
            "published" => Some(NotarizationStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotarizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price and quantity frozen at the last successful notarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedSnapshot {
    pub price_per_unit: Decimal,
    pub quantity: Decimal,
}

/// A farm inventory item.
///
/// `quantity` and `price_per_unit` are the live values. The ledger only ever
/// sees `last_published_snapshot`, which changes exclusively through a
/// successful notarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub is_published: bool,
    pub notarization_status: NotarizationStatus,
    pub last_published_snapshot: Option<PublishedSnapshot>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub transaction_receipt: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a fresh, never-notarized item
    pub fn new(
        owner_id: Uuid,
        name: impl Into<String>,
        category: impl Into<String>,
        unit: impl Into<String>,
        quantity: Decimal,
        price_per_unit: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            category: category.into(),
            unit: unit.into(),
            quantity,
            price_per_unit,
            is_published: false,
            notarization_status: NotarizationStatus::None,
            last_published_snapshot: None,
            last_synced_at: None,
            transaction_receipt: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current valuation; always derived from the live fields.
    /// Saturates rather than overflowing on out-of-range stored values.
    pub fn total_value(&self) -> Decimal {
        self.quantity.saturating_mul(self.price_per_unit)
    }

    /// Live price/quantity as a snapshot candidate
    pub fn live_values(&self) -> PublishedSnapshot {
        PublishedSnapshot {
            price_per_unit: self.price_per_unit,
            quantity: self.quantity,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Aggregate figures for a farmer's dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_value: Decimal,
    pub total_quantity: Decimal,
    pub item_count: usize,
    pub active_listings: usize,
}

impl DashboardStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut stats, item| {
            stats.total_value = stats.total_value.saturating_add(item.total_value());
            stats.total_quantity = stats.total_quantity.saturating_add(item.quantity);
            stats.item_count += 1;
            if item.notarization_status == NotarizationStatus::Published {
                stats.active_listings += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: Decimal, price: Decimal) -> InventoryItem {
        InventoryItem::new(Uuid::nil(), "Maize", "Grains", "bags", quantity, price)
    }

    #[test]
    fn test_total_value() {
        assert_eq!(
            item(Decimal::from(40), Decimal::from(12)).total_value(),
            Decimal::from(480)
        );
    }

    #[test]
    fn test_out_of_range_values_saturate() {
        let huge = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let stored = item(huge, huge);
        assert_eq!(stored.total_value(), Decimal::MAX);

        let stats = DashboardStats::from_items(&[stored.clone(), stored]);
        assert_eq!(stats.total_value, Decimal::MAX);
        assert_eq!(stats.item_count, 2);
    }
}
