//! Network resilience controller.
//!
//! Owns the connection mode (direct or through a proxy) and decides when the
//! render session has to be rebuilt on a different network path. It never
//! tears sessions down itself: every transition that changes the path comes
//! back as [`Transition::Restart`] and the caller recreates the session.
//!
//! State machine:
//!
//! ```text
//! Direct  --Blocked------------------------------> Proxied (random proxy)
//! Proxied --Blocked | ProxyError-----------------> Proxied (new random proxy)
//! Proxied --uses >= max_proxy_uses (cycle start)-> Direct
//! Proxied --rotate_on_success, uses > 0 (cycle)--> Proxied (new random proxy)
//! ```

pub mod directory;
pub mod failover;

pub use directory::{HttpProxyDirectory, ProxyDirectory, StaticProxyDirectory};
pub use failover::{AttemptHost, Resolution};

use crate::error::{ErrorCategory, ProxyDirectoryError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Network path used by the render session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Direct,
    Proxied,
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxied => write!(f, "proxied"),
        }
    }
}

/// Resilience tunables.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Retries allowed per task after the first attempt.
    pub max_retries: u32,
    /// Consecutive proxied attempts before retreating to a direct connection.
    pub max_proxy_uses: u32,
    /// Pick a fresh proxy at the start of every proxied cycle.
    pub rotate_on_success: bool,
    /// Age after which the cached proxy list is refetched.
    pub refresh_interval: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_proxy_uses: 5,
            rotate_on_success: true,
            refresh_interval: Duration::from_secs(300),
        }
    }
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub direct_attempts: u64,
    pub direct_successes: u64,
    pub proxied_attempts: u64,
    pub proxied_successes: u64,
    pub mode_switches: u64,
}

/// Serializable snapshot of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub mode: ConnectionMode,
    pub proxy: Option<String>,
    pub consecutive_proxy_uses: u32,
    pub max_proxy_uses: u32,
    pub cached_proxies: usize,
    pub stats: ConnectionStats,
}

/// What the caller must do before the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Transition {
    /// Keep the current session.
    Stay,
    /// Tear down the session and recreate it on the current path.
    Restart { reason: &'static str },
}

impl Transition {
    pub fn requires_restart(&self) -> bool {
        matches!(self, Self::Restart { .. })
    }
}

/// Connection-mode state machine with a cached proxy pool.
pub struct ConnectionController {
    mode: ConnectionMode,
    active_proxy: Option<String>,
    consecutive_proxy_uses: u32,
    stats: ConnectionStats,
    config: ResilienceConfig,
    directory: Arc<dyn ProxyDirectory>,
    proxy_cache: Vec<String>,
    cache_loaded_at: Option<Instant>,
    rng: StdRng,
}

impl ConnectionController {
    /// Start in direct mode with an empty proxy cache.
    pub fn new(config: ResilienceConfig, directory: Arc<dyn ProxyDirectory>) -> Self {
        Self::with_rng(config, directory, StdRng::from_entropy())
    }

    /// Same as [`new`](Self::new) with a caller-supplied RNG (deterministic tests).
    pub fn with_rng(
        config: ResilienceConfig,
        directory: Arc<dyn ProxyDirectory>,
        rng: StdRng,
    ) -> Self {
        Self {
            mode: ConnectionMode::Direct,
            active_proxy: None,
            consecutive_proxy_uses: 0,
            stats: ConnectionStats::default(),
            config,
            directory,
            proxy_cache: Vec::new(),
            cache_loaded_at: None,
            rng,
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Proxy endpoint the next session must use. `Some` iff proxied.
    pub fn active_proxy(&self) -> Option<&str> {
        self.active_proxy.as_deref()
    }

    pub fn consecutive_proxy_uses(&self) -> u32 {
        self.consecutive_proxy_uses
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            mode: self.mode,
            proxy: self.active_proxy.clone(),
            consecutive_proxy_uses: self.consecutive_proxy_uses,
            max_proxy_uses: self.config.max_proxy_uses,
            cached_proxies: self.proxy_cache.len(),
            stats: self.stats,
        }
    }

    /// Whether the next cycle start will retreat from the proxy to a direct path.
    pub fn retreat_pending(&self) -> bool {
        self.mode == ConnectionMode::Proxied
            && self.consecutive_proxy_uses >= self.config.max_proxy_uses
    }

    /// Cycle-start checks. The first applicable transition wins: the
    /// max-uses retreat to direct is evaluated before rotate-on-success.
    pub fn begin_cycle(&mut self) -> Transition {
        if self.retreat_pending() {
            tracing::info!(
                uses = self.consecutive_proxy_uses,
                "proxy use limit reached, retreating to direct connection"
            );
            self.switch_to_direct();
            return Transition::Restart {
                reason: "proxy use limit reached",
            };
        }

        if self.mode == ConnectionMode::Proxied
            && self.config.rotate_on_success
            && self.consecutive_proxy_uses > 0
        {
            let previous = self.active_proxy.clone();
            if let Some(next) = self.pick_proxy() {
                if previous.as_deref() != Some(next.as_str()) {
                    tracing::info!(
                        from = previous.as_deref().unwrap_or("-"),
                        to = %next,
                        "rotating proxy"
                    );
                    self.active_proxy = Some(next);
                    return Transition::Restart {
                        reason: "proxy rotation",
                    };
                }
            }
        }

        Transition::Stay
    }

    /// Count an attempt on the active path.
    pub fn record_attempt(&mut self) {
        match self.mode {
            ConnectionMode::Direct => self.stats.direct_attempts += 1,
            ConnectionMode::Proxied => {
                self.stats.proxied_attempts += 1;
                self.consecutive_proxy_uses += 1;
                tracing::debug!(
                    uses = self.consecutive_proxy_uses,
                    max = self.config.max_proxy_uses,
                    "proxied attempt"
                );
            }
        }
    }

    /// Count a success on the active path.
    pub fn record_success(&mut self) {
        match self.mode {
            ConnectionMode::Direct => self.stats.direct_successes += 1,
            ConnectionMode::Proxied => self.stats.proxied_successes += 1,
        }
    }

    /// Apply the transition matching a retryable failure.
    ///
    /// A proxy directory failure on the way from direct to proxied leaves the
    /// controller in direct mode and is returned to the caller.
    pub async fn on_failure(
        &mut self,
        category: ErrorCategory,
    ) -> Result<Transition, ProxyDirectoryError> {
        match (self.mode, category) {
            (ConnectionMode::Direct, ErrorCategory::Blocked) => {
                self.switch_to_proxy().await?;
                Ok(Transition::Restart {
                    reason: "blocked on direct connection",
                })
            }
            (ConnectionMode::Proxied, ErrorCategory::Blocked | ErrorCategory::Proxy) => {
                self.ensure_proxies().await?;
                let next = self.pick_proxy().ok_or(ProxyDirectoryError::Empty)?;
                tracing::warn!(
                    failed = self.active_proxy.as_deref().unwrap_or("-"),
                    next = %next,
                    %category,
                    "proxy failed, switching to another proxy"
                );
                self.active_proxy = Some(next);
                self.stats.mode_switches += 1;
                Ok(Transition::Restart {
                    reason: "proxy failure",
                })
            }
            (ConnectionMode::Direct, ErrorCategory::Proxy) => Ok(Transition::Restart {
                reason: "transport failure on direct connection",
            }),
            _ => Ok(Transition::Stay),
        }
    }

    /// Load the proxy list if the cache is empty.
    pub async fn ensure_proxies(&mut self) -> Result<(), ProxyDirectoryError> {
        if self.proxy_cache.is_empty() {
            self.refresh_proxies().await?;
        }
        Ok(())
    }

    /// Refetch the proxy list unconditionally.
    pub async fn refresh_proxies(&mut self) -> Result<usize, ProxyDirectoryError> {
        let proxies = self.directory.fetch().await?;
        self.proxy_cache = proxies;
        self.cache_loaded_at = Some(Instant::now());
        Ok(self.proxy_cache.len())
    }

    /// Refetch the proxy list once it is older than the refresh interval.
    /// A failed refresh keeps the previous list.
    pub async fn refresh_if_stale(&mut self) {
        let stale = self
            .cache_loaded_at
            .is_some_and(|at| at.elapsed() >= self.config.refresh_interval);
        if !stale {
            return;
        }
        match self.refresh_proxies().await {
            Ok(count) => tracing::info!(count, "proxy list refreshed"),
            Err(e) => {
                tracing::warn!("proxy list refresh failed, keeping cached list: {e}");
                self.cache_loaded_at = Some(Instant::now());
            }
        }
    }

    async fn switch_to_proxy(&mut self) -> Result<(), ProxyDirectoryError> {
        self.ensure_proxies().await?;
        let proxy = self.pick_proxy().ok_or(ProxyDirectoryError::Empty)?;
        tracing::warn!(proxy = %proxy, "switching direct -> proxied");
        self.mode = ConnectionMode::Proxied;
        self.active_proxy = Some(proxy);
        self.consecutive_proxy_uses = 0;
        self.stats.mode_switches += 1;
        Ok(())
    }

    fn switch_to_direct(&mut self) {
        tracing::info!(
            uses = self.consecutive_proxy_uses,
            "switching proxied -> direct"
        );
        self.mode = ConnectionMode::Direct;
        self.active_proxy = None;
        self.consecutive_proxy_uses = 0;
        self.stats.mode_switches += 1;
    }

    fn pick_proxy(&mut self) -> Option<String> {
        if self.proxy_cache.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.proxy_cache.len());
        Some(self.proxy_cache[index].clone())
    }
}
