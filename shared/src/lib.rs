//! Shared types and models for Agroledger
//!
//! This crate contains the domain models and the pure rules shared between
//! the backend and the browser (via WASM): sync status evaluation, stock
//! reconciliation arithmetic and boundary validation.

pub mod models;
pub mod stock;
pub mod sync_status;
pub mod validation;

pub use models::*;
pub use stock::*;
pub use sync_status::*;
pub use validation::*;
