//! Business logic services for Agroledger

pub mod inventory;
pub mod notarization;
pub mod sales;

pub use inventory::InventoryService;
pub use notarization::NotarizationService;
pub use sales::SaleService;

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Records of another owner are reported as missing
pub(crate) fn ensure_owner(record_owner: Uuid, caller: Uuid, resource: &str) -> AppResult<()> {
    if record_owner != caller {
        return Err(AppError::NotFound(resource.to_string()));
    }
    Ok(())
}
