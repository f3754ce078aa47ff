//! Stock arithmetic for sale reconciliation
//!
//! Every edit of a linked sale goes through "restore then reapply": the old
//! sale's quantity is added back to the item, then the new quantity is taken
//! out. Repeated edits therefore never accumulate deltas.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Insufficient stock. Only {available} units available")]
    ExceedsAvailable { available: Decimal },
    #[error("Restored quantity is out of range")]
    OutOfRange,
}

/// Quantity left after a new sale.
///
/// Overselling is rejected unless `allow_overdraw` is set, in which case the
/// result clamps at zero.
pub fn quantity_after_sale(
    stock_before_sale: Decimal,
    quantity_sold: Decimal,
    allow_overdraw: bool,
) -> Result<Decimal, StockError> {
    if quantity_sold > stock_before_sale && !allow_overdraw {
        return Err(StockError::ExceedsAvailable {
            available: stock_before_sale,
        });
    }
    Ok((stock_before_sale - quantity_sold).max(Decimal::ZERO))
}

/// Units available to an edited sale: current stock plus what the sale
/// already took
pub fn available_for_edit(
    current_quantity: Decimal,
    previously_sold: Decimal,
) -> Result<Decimal, StockError> {
    current_quantity
        .checked_add(previously_sold)
        .ok_or(StockError::OutOfRange)
}

/// Quantity after replacing a sale of `previously_sold` with `now_sold`
pub fn quantity_after_edit(
    current_quantity: Decimal,
    previously_sold: Decimal,
    now_sold: Decimal,
) -> Result<Decimal, StockError> {
    let restored = available_for_edit(current_quantity, previously_sold)?;
    let remaining = restored - now_sold;
    if remaining < Decimal::ZERO {
        return Err(StockError::ExceedsAvailable {
            available: restored,
        });
    }
    Ok(remaining)
}

/// Quantity after a sale is removed
pub fn quantity_after_removal(
    current_quantity: Decimal,
    previously_sold: Decimal,
) -> Result<Decimal, StockError> {
    available_for_edit(current_quantity, previously_sold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_sale_subtracts_from_stock() {
        assert_eq!(quantity_after_sale(d(100), d(20), false), Ok(d(80)));
    }

    #[test]
    fn test_sale_of_entire_stock() {
        assert_eq!(quantity_after_sale(d(20), d(20), false), Ok(d(0)));
    }

    #[test]
    fn test_oversell_rejected_without_override() {
        assert_eq!(
            quantity_after_sale(d(10), d(11), false),
            Err(StockError::ExceedsAvailable { available: d(10) })
        );
    }

    #[test]
    fn test_oversell_clamps_with_override() {
        assert_eq!(quantity_after_sale(d(10), d(11), true), Ok(d(0)));
    }

    #[test]
    fn test_edit_restores_before_reapplying() {
        // 100 in stock, sale of 20 left 80; editing to 35 leaves 65
        assert_eq!(quantity_after_edit(d(80), d(20), d(35)), Ok(d(65)));
    }

    #[test]
    fn test_edit_beyond_restored_ceiling() {
        let err = quantity_after_edit(d(80), d(20), d(101)).unwrap_err();
        assert_eq!(err, StockError::ExceedsAvailable { available: d(100) });
        assert_eq!(err.to_string(), "Insufficient stock. Only 100 units available");
    }

    #[test]
    fn test_edit_up_to_ceiling() {
        assert_eq!(quantity_after_edit(d(80), d(20), d(100)), Ok(d(0)));
    }

    #[test]
    fn test_removal_restores() {
        assert_eq!(quantity_after_removal(d(65), d(35)), Ok(d(100)));
    }

    #[test]
    fn test_restore_past_decimal_range_is_an_error() {
        assert_eq!(
            quantity_after_removal(Decimal::MAX, d(1)),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            quantity_after_edit(Decimal::MAX, Decimal::MAX, d(1)),
            Err(StockError::OutOfRange)
        );
    }

    proptest! {
        /// Create, any number of edits, then removal lands back on the start
        #[test]
        fn prop_round_trip_restores_stock(
            start in 0i64..10_000,
            edits in prop::collection::vec(0i64..10_000, 1..8),
        ) {
            let first = edits[0].min(start);
            let start = d(start);
            let mut sold = d(first);
            let mut qty = quantity_after_sale(start, sold, false).unwrap();

            for next in &edits[1..] {
                match quantity_after_edit(qty, sold, d(*next)) {
                    Ok(after) => {
                        qty = after;
                        sold = d(*next);
                    }
                    Err(StockError::ExceedsAvailable { available }) => {
                        prop_assert_eq!(available, qty + sold);
                    }
                    Err(StockError::OutOfRange) => prop_assert!(false, "small values overflowed"),
                }
                prop_assert!(qty >= Decimal::ZERO);
            }

            prop_assert_eq!(quantity_after_removal(qty, sold), Ok(start));
        }
    }
}
