//! Error types for the batch recognition service.

use ledger_vision::VisionError;
use thiserror::Error;

use crate::context::Interrupt;
use crate::store::{CatalogError, StoreError};

/// Errors from [`RateLimiter::wait`](crate::RateLimiter::wait).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("context cancelled while waiting for a token")]
    Cancelled,

    /// The token could not be granted before the deadline.
    #[error("rate limit wait would exceed the deadline")]
    DeadlineExceeded,
}

impl From<Interrupt> for RateLimitError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => RateLimitError::Cancelled,
            Interrupt::TimedOut => RateLimitError::DeadlineExceeded,
        }
    }
}

/// Errors returned synchronously by the recognition and category services.
///
/// Per-image failures inside a batch never surface here; they become failure
/// outcomes instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no images provided")]
    EmptyBatch,

    #[error("at most {max} images per batch")]
    TooManyImages { max: usize },

    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    #[error("too many requests, retry later")]
    TooManyRequests,

    #[error("image too large")]
    ImageTooLarge,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("failed to read image: {0}")]
    ReadImage(#[source] std::io::Error),

    #[error("recognition failed: {0}")]
    Recognition(#[from] VisionError),

    #[error("recognition timed out")]
    TimedOut,

    #[error("recognition cancelled")]
    Cancelled,

    #[error("category not found")]
    CategoryNotFound,

    #[error("category already exists")]
    CategoryExists,

    #[error("category has children")]
    CategoryHasChildren,

    #[error("category catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to save bill: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Numeric error code for API responses.
    pub fn code(&self) -> u32 {
        match self {
            ServiceError::EmptyBatch
            | ServiceError::TooManyImages { .. }
            | ServiceError::InvalidParams(_) => 10002,
            ServiceError::TooManyRequests => 10004,
            ServiceError::ReadImage(_)
            | ServiceError::Recognition(_)
            | ServiceError::TimedOut
            | ServiceError::Cancelled => 50001,
            ServiceError::ImageTooLarge => 50002,
            ServiceError::UnsupportedFormat => 50003,
            ServiceError::CategoryNotFound => 60001,
            ServiceError::CategoryExists => 60002,
            ServiceError::CategoryHasChildren => 60003,
            ServiceError::Catalog(_) | ServiceError::Store(_) => 10001,
        }
    }
}

impl From<Interrupt> for ServiceError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => ServiceError::Cancelled,
            Interrupt::TimedOut => ServiceError::TimedOut,
        }
    }
}
