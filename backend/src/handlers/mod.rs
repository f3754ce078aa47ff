//! HTTP handlers

pub mod health;
pub mod inventory;
pub mod marketplace;
pub mod notarization;
pub mod sales;

pub use health::*;
pub use inventory::*;
pub use marketplace::*;
pub use notarization::*;
pub use sales::*;
