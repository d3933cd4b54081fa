//! Batch recognition configuration.

use std::time::Duration;

use thiserror::Error;

/// Largest image accepted by default (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Batch recognition configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum images accepted in one batch.
    pub max_images: usize,

    /// Number of persistent workers per batch.
    pub worker_count: usize,

    /// Recognition requests per minute, shared by every batch.
    pub rpm: u32,

    /// Deadline for a single image, rate-limit wait included (seconds).
    pub task_timeout_secs: u64,

    /// Largest accepted image, by declared size.
    pub max_image_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_images: 20,
            worker_count: 1,
            rpm: 60,
            task_timeout_secs: 60,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// A configuration value outside its allowed range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field} must be at least 1")]
pub struct ConfigError {
    pub field: &'static str,
}

impl Config {
    /// Check every value is at least 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&'static str, u64); 5] = [
            ("max_images", self.max_images as u64),
            ("worker_count", self.worker_count as u64),
            ("rpm", u64::from(self.rpm)),
            ("task_timeout_secs", self.task_timeout_secs),
            ("max_image_bytes", self.max_image_bytes),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some(&(field, _)) => Err(ConfigError { field }),
            None => Ok(()),
        }
    }

    /// Per-image deadline.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
