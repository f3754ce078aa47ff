//! External service integrations

pub mod ledger;

pub use ledger::{HttpLedgerClient, InMemoryLedger, LedgerClient, LedgerError};
