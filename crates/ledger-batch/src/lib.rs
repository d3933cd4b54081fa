//! Smart Ledger batch recognition.
//!
//! Images go through a fixed pool of workers that share one requests-per-minute
//! budget. Each image gets its own deadline, fails on its own, and lands at its
//! own position in the result:
//!
//! - [`RateLimiter`] paces calls to the recognizer
//! - [`WorkerPool`] runs a batch with bounded concurrency
//! - [`RecognitionService`] validates batches, builds the prompt from the
//!   user's categories through the [`CategoryCache`] and saves bills
//! - [`CategoryService`] manages categories and keeps the cache fresh

pub mod cache;
pub mod category;
pub mod config;
pub mod context;
pub mod error;
pub mod limiter;
pub mod pool;
pub mod service;
pub mod store;
pub mod task;

#[cfg(test)]
mod testing;

pub use cache::CategoryCache;
pub use category::{CategoryService, CreateCategory, UpdateCategory};
pub use config::{Config, ConfigError};
pub use context::{Deadline, Interrupt};
pub use error::{RateLimitError, ServiceError};
pub use limiter::{burst_for_rpm, RateLimiter};
pub use pool::WorkerPool;
pub use service::RecognitionService;
pub use store::{
    CatalogError, CategoryCatalog, CategoryRecord, CategoryRepository, LedgerStore, MemoryCatalog,
    MemoryLedger, NewCategory, StoreError,
};
pub use task::{content_type_for_path, ImageSource, RecognitionTask};
