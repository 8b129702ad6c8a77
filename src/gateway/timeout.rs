//! Execution Timeout Management
//!
//! Wall-clock bounds for tool invocations.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Execution timeout configuration
///
/// Every invocation carries one. There is no "no timeout" setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::medium()
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use recon_gateway::gateway::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Full port sweeps and crawls (30 minutes)
    pub fn long() -> Self {
        Self::from_secs(1800)
    }

    /// Typical active scan (5 minutes, default)
    pub fn medium() -> Self {
        Self::from_secs(300)
    }

    /// DNS lookups and other quick tools (30 seconds)
    pub fn short() -> Self {
        Self::from_secs(30)
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Drive a future to completion or until the timeout expires.
    ///
    /// Returns `None` when the deadline passed first. The future is dropped
    /// in that case; callers that own external resources must clean them up.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        time::timeout(self.duration, future).await.ok()
    }
}
