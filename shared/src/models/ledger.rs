//! Records as they exist on the external notarization ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notarized price/quantity pair read back from the ledger.
///
/// The ledger stores integral values only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizedRecord {
    pub item_id: Uuid,
    pub price: u64,
    pub quantity: u64,
    pub notarized_by: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
}

/// Proof that a notarization was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationReceipt {
    pub transaction_hash: String,
}
