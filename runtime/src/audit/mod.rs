//! Audit trail of task resolutions.

pub mod logger;

pub use logger::{AuditEntry, AuditLogger};
