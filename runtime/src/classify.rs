//! Error classifier: maps failure text to the category that drives failover.
//!
//! Pure and stateless. The connection mode is an input because a navigation
//! timeout means "bad proxy" only while traffic goes through one.

use crate::error::{ErrorCategory, LocateError};
use crate::resilience::ConnectionMode;

/// Signatures of anti-bot blocking or protocol-level interference.
const BLOCK_PATTERNS: &[&str] = &[
    "ERR_HTTP2_PROTOCOL_ERROR",
    "ERR_CONNECTION_CLOSED",
    "NS_ERROR_NET_INTERRUPT",
    "HTTP/2 Error: INTERNAL_ERROR",
    "Stream error in the HTTP/2 framing layer",
    "infinite loading suspected",
    "net::ERR_FAILED",
    "403 Forbidden",
    "Bot Detection",
    "Security Challenge",
    "BLOCKED",
    "blocked",
];

/// Explicit transport failures of the proxy itself. Checked before the block
/// patterns so a dead proxy is rotated rather than treated as detection.
const PROXY_PATTERNS: &[&str] = &[
    "ERR_PROXY_CONNECTION_FAILED",
    "ERR_SOCKS_CONNECTION_FAILED",
    "ERR_TUNNEL_CONNECTION_FAILED",
];

const TIMEOUT_PATTERNS: &[&str] = &["Timeout", "timeout", "timed out", "TimeoutError"];

/// Classify raw failure text.
///
/// Idempotent: the same message and mode always yield the same category.
pub fn classify(message: &str, mode: ConnectionMode) -> ErrorCategory {
    if PROXY_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorCategory::Proxy;
    }
    if BLOCK_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorCategory::Blocked;
    }
    if mode == ConnectionMode::Proxied && TIMEOUT_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorCategory::Proxy;
    }
    ErrorCategory::Unclassified
}

/// Classify a locator failure for failover purposes.
pub fn classify_locate(err: &LocateError, mode: ConnectionMode) -> ErrorCategory {
    match err {
        LocateError::Blocked(_) => ErrorCategory::Blocked,
        LocateError::ListNotFound | LocateError::Pagination { .. } => ErrorCategory::Unclassified,
        LocateError::Render(message) => classify(message, mode),
    }
}

/// The tag a failure is reported under when it is not retried.
pub fn report_category(err: &LocateError, mode: ConnectionMode) -> ErrorCategory {
    match classify_locate(err, mode) {
        ErrorCategory::Unclassified => match err {
            LocateError::ListNotFound => ErrorCategory::ListNotFound,
            LocateError::Pagination { .. } => ErrorCategory::Pagination,
            _ => ErrorCategory::Unclassified,
        },
        other => other,
    }
}
