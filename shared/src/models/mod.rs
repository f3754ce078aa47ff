//! Domain models for Agroledger

mod inventory;
mod ledger;
mod sale;

pub use inventory::*;
pub use ledger::*;
pub use sale::*;
