//! Adaptive polling delay between agent cycles.
//!
//! Acquiring a task or completing one resets the delay to its base value;
//! an empty queue or a failed cycle grows it linearly up to a ceiling.

use crate::shutdown::Shutdown;
use serde::Serialize;
use std::time::Duration;

/// Tunables for the backoff scheduler, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub increment_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3_000,
            increment_ms: 10_000,
            max_delay_ms: 300_000,
        }
    }
}

/// How a backoff wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Shutdown,
}

/// Linear backoff state. Single owner; no interior mutability.
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    current_delay_ms: u64,
    config: BackoffConfig,
}

impl BackoffScheduler {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_delay_ms: config.base_delay_ms.min(config.max_delay_ms),
            config,
        }
    }

    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(self.current_delay_ms)
    }

    pub fn current_delay_ms(&self) -> u64 {
        self.current_delay_ms
    }

    /// Whether the delay has reached its ceiling.
    pub fn at_ceiling(&self) -> bool {
        self.current_delay_ms >= self.config.max_delay_ms
    }

    pub fn on_task_acquired(&mut self) {
        self.reset();
    }

    pub fn on_success(&mut self) {
        self.reset();
    }

    pub fn on_empty_queue(&mut self) {
        self.escalate();
    }

    pub fn on_failure(&mut self) {
        self.escalate();
    }

    fn reset(&mut self) {
        self.current_delay_ms = self.config.base_delay_ms.min(self.config.max_delay_ms);
    }

    fn escalate(&mut self) {
        self.current_delay_ms = self
            .current_delay_ms
            .saturating_add(self.config.increment_ms)
            .min(self.config.max_delay_ms);
    }

    /// Sleep for the current delay. Only process shutdown cuts it short.
    pub async fn wait(&self, shutdown: &Shutdown) -> WaitOutcome {
        if shutdown.is_triggered() {
            return WaitOutcome::Shutdown;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.current_delay()) => WaitOutcome::Elapsed,
            _ = shutdown.wait() => WaitOutcome::Shutdown,
        }
    }
}
