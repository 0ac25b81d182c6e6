//! Opening the transport with bounded exponential backoff.
//!
//! Each failed attempt closes the transport, sleeps, and doubles the delay.
//! The loop gives up once the next delay would exceed the ceiling. With the
//! defaults (1 s initial, 36000 s ceiling) that is 16 attempts sleeping
//! 1, 2, 4 ... 32768 seconds, about 18 hours in total.
//!
//! The caller's future stays pending for the whole backoff; it resolves only
//! when the transport is open or the budget is spent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DmError, Result};
use crate::transport::Transport;

/// Default first retry delay in seconds.
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 1;

/// Default ceiling on the retry delay in seconds.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 36000;

/// Doubling backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// No attempt is made whose following delay would exceed this.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_initial_delay() -> u64 {
    DEFAULT_INITIAL_DELAY_SECS
}

fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY_SECS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_delay_secs: u64, max_delay_secs: u64) -> Self {
        Self {
            initial_delay_secs,
            max_delay_secs,
        }
    }

    /// Sleep after each failed attempt, in order. One entry per attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = self.max_delay_secs;
        std::iter::successors(Some(self.initial_delay_secs.max(1)), |secs| {
            secs.checked_mul(2)
        })
        .take_while(move |&secs| secs <= max)
        .map(Duration::from_secs)
    }

    /// Total number of open attempts.
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.delays().count()).unwrap_or(u32::MAX)
    }

    /// Validates the policy.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.initial_delay_secs == 0 {
            return Err("initial_delay_secs must be > 0".to_string());
        }
        if self.max_delay_secs < self.initial_delay_secs {
            return Err("max_delay_secs must be >= initial_delay_secs".to_string());
        }
        Ok(())
    }
}

/// Opens a transport under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionOpener {
    policy: RetryPolicy,
}

impl ConnectionOpener {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Open `transport`, retrying with backoff.
    ///
    /// Returns the number of attempts made. Fails with `ConnectFailure`
    /// once the schedule is exhausted.
    pub async fn open(&self, transport: &mut dyn Transport) -> Result<u32> {
        let mut attempts = 0;

        for delay in self.policy.delays() {
            attempts += 1;

            match transport.open().await {
                Ok(()) => {
                    tracing::debug!("Transport open after {} attempts", attempts);
                    return Ok(attempts);
                }
                Err(e) => {
                    tracing::warn!("Open attempt {} failed: {}", attempts, e);
                }
            }

            if let Err(e) = transport.close().await {
                tracing::error!("Close after failed open failed: {}", e);
            }

            tracing::info!("Retry open in {} seconds", delay.as_secs());
            tokio::time::sleep(delay).await;
        }

        tracing::error!("Failed to open a connection after {} attempts", attempts);
        Err(DmError::ConnectFailure { attempts })
    }
}
