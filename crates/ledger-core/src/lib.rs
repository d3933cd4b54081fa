//! Smart Ledger Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Database
//! - Runtime specifics
//!
//! Everything the recognition pipeline passes between its layers lives here:
//! recognition payloads, per-image outcomes, batch responses, categories and
//! the bills persisted from recognition results.

pub mod bill;
pub mod category;
pub mod error;
pub mod ids;
pub mod outcome;
pub mod recognition;

// Re-export commonly used types
pub use bill::{Bill, BillItem};
pub use category::{Category, CategoryTemplate, DEFAULT_TEMPLATES};
pub use error::CoreError;
pub use ids::{BillId, CategoryId, UserId};
pub use outcome::{
    BatchItem, BatchResult, BatchSaveItem, BatchSaveResult, OutcomeStatus, RecognitionOutcome,
};
pub use recognition::{BillType, RecognitionResult, RecognizedItem};
