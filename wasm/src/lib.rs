//! WebAssembly module for Agroledger
//!
//! Runs the same rules as the server in the browser:
//! - Sync status of a listing against its notarized snapshot
//! - Stock previews while a sale form is being filled in
//! - Buyer validation and sale totals
//!
//! Decimal values cross the boundary as strings so no precision is lost.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    available_for_edit, evaluate, evaluate_fields, quantity_after_edit, quantity_after_sale,
    total_amount, total_quantity, validate_buyers, validate_publishable, Buyer, InventoryItem,
    PublishedSnapshot,
};
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::sync_status::*;

#[derive(Debug, Serialize)]
struct SaleTotals {
    total_quantity_sold: Decimal,
    total_amount_received: Decimal,
}

fn js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    js_sys::Error::new(&message).into()
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("{} is not a number", field))
}

fn parse_buyers(buyers_json: &str) -> Result<Vec<Buyer>, String> {
    let buyers: Vec<Buyer> =
        serde_json::from_str(buyers_json).map_err(|e| format!("Invalid buyers JSON: {}", e))?;
    validate_buyers(&buyers).map_err(|e| e.to_string())?;
    Ok(buyers)
}

fn sync_for_item(item_json: &str) -> Result<String, String> {
    let item: InventoryItem =
        serde_json::from_str(item_json).map_err(|e| format!("Invalid item JSON: {}", e))?;
    serde_json::to_string(&evaluate(&item)).map_err(|e| e.to_string())
}

fn sync_for_fields(
    is_published: bool,
    snapshot_price: Option<String>,
    snapshot_quantity: Option<String>,
    price_per_unit: &str,
    quantity: &str,
) -> Result<String, String> {
    let snapshot = match (snapshot_price, snapshot_quantity) {
        (Some(price), Some(qty)) => Some(PublishedSnapshot {
            price_per_unit: parse_decimal("snapshot_price", &price)?,
            quantity: parse_decimal("snapshot_quantity", &qty)?,
        }),
        _ => None,
    };

    let evaluation = evaluate_fields(
        is_published,
        snapshot.as_ref(),
        parse_decimal("price_per_unit", price_per_unit)?,
        parse_decimal("quantity", quantity)?,
    );
    Ok(evaluation.status.as_str().to_string())
}

fn sale_preview(stock: &str, buyers_json: &str, allow_overdraw: bool) -> Result<String, String> {
    let stock = parse_decimal("stock", stock)?;
    let buyers = parse_buyers(buyers_json)?;
    let remaining = quantity_after_sale(stock, total_quantity(&buyers), allow_overdraw)
        .map_err(|e| e.to_string())?;
    Ok(remaining.to_string())
}

fn edit_preview(
    current: &str,
    previously_sold: &str,
    buyers_json: &str,
) -> Result<String, String> {
    let current = parse_decimal("current_quantity", current)?;
    let previously_sold = parse_decimal("previously_sold", previously_sold)?;
    let buyers = parse_buyers(buyers_json)?;
    let remaining = quantity_after_edit(current, previously_sold, total_quantity(&buyers))
        .map_err(|e| e.to_string())?;
    Ok(remaining.to_string())
}

fn totals(buyers_json: &str) -> Result<String, String> {
    let buyers = parse_buyers(buyers_json)?;
    serde_json::to_string(&SaleTotals {
        total_quantity_sold: total_quantity(&buyers),
        total_amount_received: total_amount(&buyers),
    })
    .map_err(|e| e.to_string())
}

/// Sync evaluation of a serialized item, as `{is_out_of_sync, status}` JSON
#[wasm_bindgen]
pub fn evaluate_item_sync(item_json: &str) -> Result<String, JsValue> {
    sync_for_item(item_json).map_err(js_error)
}

/// Sync status label (`none`, `published`, `sync_required`) from loose fields
#[wasm_bindgen]
pub fn sync_status_label(
    is_published: bool,
    snapshot_price: Option<String>,
    snapshot_quantity: Option<String>,
    price_per_unit: &str,
    quantity: &str,
) -> Result<String, JsValue> {
    sync_for_fields(
        is_published,
        snapshot_price,
        snapshot_quantity,
        price_per_unit,
        quantity,
    )
    .map_err(js_error)
}

/// Stock left after a new sale, or the insufficient stock message
#[wasm_bindgen]
pub fn preview_sale_quantity(
    stock: &str,
    buyers_json: &str,
    allow_overdraw: bool,
) -> Result<String, JsValue> {
    sale_preview(stock, buyers_json, allow_overdraw).map_err(js_error)
}

/// Units an edited sale may use
#[wasm_bindgen]
pub fn available_for_sale_edit(
    current_quantity: &str,
    previously_sold: &str,
) -> Result<String, JsValue> {
    let current = parse_decimal("current_quantity", current_quantity).map_err(js_error)?;
    let sold = parse_decimal("previously_sold", previously_sold).map_err(js_error)?;
    available_for_edit(current, sold)
        .map(|available| available.to_string())
        .map_err(|e| js_error(e.to_string()))
}

/// Stock left after editing a sale
#[wasm_bindgen]
pub fn preview_edit_quantity(
    current_quantity: &str,
    previously_sold: &str,
    buyers_json: &str,
) -> Result<String, JsValue> {
    edit_preview(current_quantity, previously_sold, buyers_json).map_err(js_error)
}

/// Totals of a buyer list, as `{total_quantity_sold, total_amount_received}`
#[wasm_bindgen]
pub fn calculate_sale_totals(buyers_json: &str) -> Result<String, JsValue> {
    totals(buyers_json).map_err(js_error)
}

/// Whether the publish button may be enabled
#[wasm_bindgen]
pub fn can_publish(price_per_unit: &str, quantity: &str) -> bool {
    match (
        parse_decimal("price_per_unit", price_per_unit),
        parse_decimal("quantity", quantity),
    ) {
        (Ok(price), Ok(qty)) => validate_publishable(price, qty).is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUYERS: &str = r#"[
        {"name": "Ama", "quantity": "20", "amount_paid": "10000"},
        {"name": "Kofi", "quantity": "15", "amount_paid": "7500"}
    ]"#;

    #[test]
    fn test_sync_status_label() {
        let label = |published, snap: Option<(&str, &str)>, price, qty| {
            sync_status_label(
                published,
                snap.map(|s| s.0.to_string()),
                snap.map(|s| s.1.to_string()),
                price,
                qty,
            )
            .unwrap()
        };

        assert_eq!(label(false, Some(("50", "10")), "50", "10"), "none");
        assert_eq!(label(true, None, "50", "10"), "none");
        assert_eq!(label(true, Some(("50", "10")), "50", "10"), "published");
        assert_eq!(label(true, Some(("50", "10")), "50", "7"), "sync_required");
    }

    #[test]
    fn test_sale_previews() {
        assert_eq!(preview_sale_quantity("100", BUYERS, false).unwrap(), "65");
        assert_eq!(preview_edit_quantity("80", "20", BUYERS).unwrap(), "65");
        assert_eq!(available_for_sale_edit("80", "20").unwrap(), "100");
    }

    #[test]
    fn test_oversell_preview_message() {
        assert_eq!(
            sale_preview("30", BUYERS, false).unwrap_err(),
            "Insufficient stock. Only 30 units available"
        );
        assert_eq!(sale_preview("30", BUYERS, true).unwrap(), "0");
    }

    #[test]
    fn test_sale_totals() {
        let json = calculate_sale_totals(BUYERS).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_quantity_sold"], "35");
        assert_eq!(value["total_amount_received"], "17500");
    }

    #[test]
    fn test_invalid_buyers_rejected() {
        assert!(parse_buyers("[]").is_err());
        assert!(parse_buyers(r#"[{"name": " ", "quantity": "1", "amount_paid": "1"}]"#).is_err());
        assert!(parse_buyers("not json").is_err());
    }

    #[test]
    fn test_can_publish() {
        assert!(can_publish("50", "10"));
        assert!(!can_publish("0", "10"));
        assert!(!can_publish("50", "0"));
        assert!(!can_publish("12.5", "10"));
        assert!(!can_publish("abc", "10"));
    }
}
