//! Error taxonomy for locating and resolving search tasks.
//!
//! Locator errors bubble up to the resilience controller, which either
//! recovers through failover and retry or re-raises them as a task failure.

use serde::Serialize;

/// Category tag attached to every reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Anti-bot detection or protocol-level interference.
    Blocked,
    /// Navigation timeout while proxied, or an explicit proxy connection failure.
    Proxy,
    ListNotFound,
    Pagination,
    ProxyListUnavailable,
    RetryBudgetExceeded,
    Unclassified,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Proxy => "proxy",
            Self::ListNotFound => "list_not_found",
            Self::Pagination => "pagination",
            Self::ProxyListUnavailable => "proxy_list_unavailable",
            Self::RetryBudgetExceeded => "retry_budget_exceeded",
            Self::Unclassified => "unclassified",
        }
    }

    /// Whether the resilience controller answers this category with failover.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Blocked | Self::Proxy)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised while locating a target in the search results.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// The page carries an anti-bot or error-page signature.
    #[error("BLOCKED: {0}")]
    Blocked(String),

    /// The result list never appeared and the page showed no error signature.
    #[error("Product list not found")]
    ListNotFound,

    /// Moving to the next result page could not be confirmed.
    #[error("pagination to page {page} failed: {reason}")]
    Pagination { page: u32, reason: String },

    /// Any failure reported by the render engine (navigation, scripting, waits).
    #[error("{0}")]
    Render(String),
}

impl LocateError {
    pub fn render(err: anyhow::Error) -> Self {
        Self::Render(format!("{err:#}"))
    }
}

/// The proxy directory could not produce a usable proxy list.
#[derive(Debug, thiserror::Error)]
pub enum ProxyDirectoryError {
    #[error("proxy directory request failed: {0}")]
    Request(String),

    #[error("proxy directory returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("proxy directory is empty")]
    Empty,
}

impl ProxyDirectoryError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::ProxyListUnavailable
    }
}

/// Terminal outcome of a task's resolution chain.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A failure that is not retried at the resilience layer, or a retryable
    /// failure whose failover transition could not be applied.
    #[error("{source}")]
    Locate {
        category: ErrorCategory,
        #[source]
        source: LocateError,
    },

    /// Every retry allowed for the task was consumed.
    #[error("retry budget exceeded after {attempts} attempts: {last}")]
    RetryBudgetExceeded {
        attempts: u32,
        #[source]
        last: LocateError,
    },
}

impl ResolveError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Locate { category, .. } => *category,
            Self::RetryBudgetExceeded { .. } => ErrorCategory::RetryBudgetExceeded,
        }
    }
}
