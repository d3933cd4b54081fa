//! Per-task deadlines derived from a parent cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Deadline`] stopped the work it was guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The parent token was cancelled.
    Cancelled,
    /// The deadline passed.
    TimedOut,
}

/// A child of the parent context that also expires at a fixed instant.
///
/// Cancelling the parent cancels every deadline derived from it; expiry of
/// one deadline never affects its parent or siblings.
#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Instant,
}

impl Deadline {
    /// Derive a deadline `timeout` from now under `parent`.
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            token: parent.child_token(),
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns true if the parent has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Check whether the deadline is still live.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            Err(Interrupt::Cancelled)
        } else if self.is_expired() {
            Err(Interrupt::TimedOut)
        } else {
            Ok(())
        }
    }

    /// Resolves once the parent is cancelled or the deadline passes.
    pub async fn interrupted(&self) -> Interrupt {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Interrupt::Cancelled,
            _ = tokio::time::sleep_until(self.expires_at) => Interrupt::TimedOut,
        }
    }

    /// Drive `fut` until it completes or the deadline interrupts it.
    ///
    /// An interrupted future is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        self.check()?;
        tokio::select! {
            biased;
            interrupt = self.interrupted() => Err(interrupt),
            output = fut => Ok(output),
        }
    }
}
