//! Sync status evaluation
//!
//! Classifies an item's live price/quantity against its last notarized
//! snapshot. Pure and cheap: listing pages and dashboards call this per item
//! on every read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{InventoryItem, PublishedSnapshot};

/// Relationship between the live record and the ledger snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Not published, or never notarized
    None,
    /// Live values match the snapshot
    Published,
    /// Live values drifted after a local edit or sale
    SyncRequired,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::None => "none",
            SyncStatus::Published => "published",
            SyncStatus::SyncRequired => "sync_required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvaluation {
    pub is_out_of_sync: bool,
    pub status: SyncStatus,
}

impl SyncEvaluation {
    const NONE: Self = Self {
        is_out_of_sync: false,
        status: SyncStatus::None,
    };
}

/// Evaluate an item's sync status
pub fn evaluate(item: &InventoryItem) -> SyncEvaluation {
    evaluate_fields(
        item.is_published,
        item.last_published_snapshot.as_ref(),
        item.price_per_unit,
        item.quantity,
    )
}

/// Field-level form of [`evaluate`], for callers holding a partial record
pub fn evaluate_fields(
    is_published: bool,
    snapshot: Option<&PublishedSnapshot>,
    price_per_unit: Decimal,
    quantity: Decimal,
) -> SyncEvaluation {
    let snapshot = match snapshot {
        Some(snapshot) if is_published => snapshot,
        _ => return SyncEvaluation::NONE,
    };

    if snapshot.price_per_unit != price_per_unit || snapshot.quantity != quantity {
        SyncEvaluation {
            is_out_of_sync: true,
            status: SyncStatus::SyncRequired,
        }
    } else {
        SyncEvaluation {
            is_out_of_sync: false,
            status: SyncStatus::Published,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotarizationStatus;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn item(quantity: i64, price: i64) -> InventoryItem {
        InventoryItem::new(
            Uuid::new_v4(),
            "Yam",
            "Tubers",
            "tubers",
            Decimal::from(quantity),
            Decimal::from(price),
        )
    }

    fn published(mut item: InventoryItem, snap_qty: i64, snap_price: i64) -> InventoryItem {
        item.is_published = true;
        item.notarization_status = NotarizationStatus::Published;
        item.last_published_snapshot = Some(PublishedSnapshot {
            price_per_unit: Decimal::from(snap_price),
            quantity: Decimal::from(snap_qty),
        });
        item
    }

    #[test]
    fn test_unpublished_item_is_none() {
        let eval = evaluate(&item(10, 50));
        assert_eq!(eval.status, SyncStatus::None);
        assert!(!eval.is_out_of_sync);
    }

    #[test]
    fn test_unpublished_with_retained_snapshot_is_none() {
        let mut it = published(item(7, 50), 10, 50);
        it.is_published = false;
        assert_eq!(evaluate(&it).status, SyncStatus::None);
    }

    #[test]
    fn test_published_without_snapshot_is_none() {
        let mut it = item(10, 50);
        it.is_published = true;
        assert_eq!(evaluate(&it).status, SyncStatus::None);
    }

    #[test]
    fn test_matching_snapshot_is_published() {
        let eval = evaluate(&published(item(10, 50), 10, 50));
        assert_eq!(eval.status, SyncStatus::Published);
        assert!(!eval.is_out_of_sync);
    }

    #[test]
    fn test_quantity_drift_requires_sync() {
        let eval = evaluate(&published(item(7, 50), 10, 50));
        assert_eq!(eval.status, SyncStatus::SyncRequired);
        assert!(eval.is_out_of_sync);
    }

    #[test]
    fn test_price_drift_requires_sync() {
        let eval = evaluate(&published(item(10, 55), 10, 50));
        assert_eq!(eval.status, SyncStatus::SyncRequired);
    }

    #[test]
    fn test_scale_does_not_count_as_drift() {
        let mut it = published(item(10, 50), 10, 50);
        it.price_per_unit = Decimal::new(5000, 2);
        assert_eq!(evaluate(&it).status, SyncStatus::Published);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SyncStatus::SyncRequired).unwrap();
        assert_eq!(json, "\"sync_required\"");
    }

    proptest! {
        #[test]
        fn prop_none_iff_unpublished_or_no_snapshot(
            is_published in any::<bool>(),
            has_snapshot in any::<bool>(),
            qty in 0i64..1000,
            price in 0i64..1000,
        ) {
            let mut it = item(qty, price);
            it.is_published = is_published;
            if has_snapshot {
                it.last_published_snapshot = Some(it.live_values());
            }
            let is_none = evaluate(&it).status == SyncStatus::None;
            prop_assert_eq!(is_none, !is_published || !has_snapshot);
        }

        #[test]
        fn prop_sync_required_iff_fields_differ(
            qty in 0i64..1000,
            price in 0i64..1000,
            snap_qty in 0i64..1000,
            snap_price in 0i64..1000,
        ) {
            let eval = evaluate(&published(item(qty, price), snap_qty, snap_price));
            let differs = qty != snap_qty || price != snap_price;
            prop_assert_eq!(eval.is_out_of_sync, differs);
            let expected = if differs { SyncStatus::SyncRequired } else { SyncStatus::Published };
            prop_assert_eq!(eval.status, expected);
        }
    }
}
