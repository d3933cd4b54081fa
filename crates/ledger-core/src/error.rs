//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Smart Ledger.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bill type code or name not recognised.
    #[error("Unknown bill type: {0}")]
    UnknownBillType(String),
}
