//! JSONL audit log: one line per resolved task.
//!
//! - Append-only JSONL format for easy parsing
//! - Rotation when the file exceeds `max_size` (100MB by default)
//! - Rotated files named `.1`, `.2`, etc. (max 5 rotations)

use crate::error::ResolveError;
use crate::model::SearchTask;
use crate::resilience::{ConnectionMode, Resolution};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum audit log size before rotation (100 MB).
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

/// One resolved (or failed) task.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub task_id: i64,
    pub keyword: String,
    pub target: String,
    /// Global rank; `0` when not found. Absent on failure.
    pub rank: Option<u32>,
    pub mode: ConnectionMode,
    pub proxy: Option<String>,
    pub attempts: Option<u32>,
    pub duration_ms: u64,
    /// `found`, `not_found`, or the failure category.
    pub outcome: String,
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn resolved(task: &SearchTask, resolution: &Resolution, elapsed: Duration) -> Self {
        let outcome = if resolution.record.is_found() {
            "found"
        } else {
            "not_found"
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            task_id: task.id,
            keyword: task.keyword.clone(),
            target: task.target_code.clone(),
            rank: Some(resolution.record.rank),
            mode: resolution.mode,
            proxy: resolution.proxy.clone(),
            attempts: Some(resolution.attempts),
            duration_ms: elapsed.as_millis() as u64,
            outcome: outcome.to_string(),
            error: None,
        }
    }

    pub fn failed(
        task: &SearchTask,
        err: &ResolveError,
        mode: ConnectionMode,
        proxy: Option<&str>,
        elapsed: Duration,
    ) -> Self {
        let attempts = match err {
            ResolveError::RetryBudgetExceeded { attempts, .. } => Some(*attempts),
            ResolveError::Locate { .. } => None,
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            task_id: task.id,
            keyword: task.keyword.clone(),
            target: task.target_code.clone(),
            rank: None,
            mode,
            proxy: proxy.map(String::from),
            attempts,
            duration_ms: elapsed.as_millis() as u64,
            outcome: err.category().as_str().to_string(),
            error: Some(err.to_string()),
        }
    }
}

/// Append-only JSONL audit logger with automatic rotation.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
    max_size: u64,
}

impl AuditLogger {
    /// Open or create the audit log file.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_limit(path, MAX_LOG_SIZE)
    }

    pub fn open_with_limit(path: &Path, max_size: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_size,
            max_size,
        })
    }

    /// Open the default audit log at ~/.rankwatch/audit.jsonl.
    pub fn default_logger() -> Result<Self> {
        Self::open(&default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry.
    pub fn log(&mut self, entry: &AuditEntry) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{json}").context("failed to write audit entry")?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Rotate log files: audit.jsonl → audit.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| "failed to reopen audit log after rotation")?;
        self.current_size = 0;

        Ok(())
    }
}

/// `~/.rankwatch/audit.jsonl`, or under `/tmp` without a home directory.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".rankwatch")
        .join("audit.jsonl")
}

/// Build path for a rotated log file: `audit.jsonl.1`, `audit.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, LocateError};
    use crate::model::ProductRecord;

    fn resolution(rank: u32) -> Resolution {
        Resolution {
            record: ProductRecord {
                rank,
                ..ProductRecord::default()
            },
            attempts: 2,
            mode: ConnectionMode::Proxied,
            proxy: Some("http://10.0.0.1:3128".into()),
        }
    }

    #[test]
    fn test_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let task = SearchTask::new(4, "무선이어폰", "7279806373");

        let mut logger = AuditLogger::open(&path).unwrap();
        logger
            .log(&AuditEntry::resolved(&task, &resolution(75), Duration::from_millis(1200)))
            .unwrap();
        let err = ResolveError::Locate {
            category: ErrorCategory::ListNotFound,
            source: LocateError::ListNotFound,
        };
        logger
            .log(&AuditEntry::failed(&task, &err, ConnectionMode::Direct, None, Duration::ZERO))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "found");
        assert_eq!(lines[0]["rank"], 75);
        assert_eq!(lines[0]["mode"], "proxied");
        assert_eq!(lines[0]["attempts"], 2);
        assert_eq!(lines[1]["outcome"], "list_not_found");
        assert!(lines[1]["rank"].is_null());
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let task = SearchTask::new(1, "kw", "1");

        let mut logger = AuditLogger::open_with_limit(&path, 1).unwrap();
        for _ in 0..(MAX_ROTATIONS + 3) {
            logger
                .log(&AuditEntry::resolved(&task, &resolution(0), Duration::ZERO))
                .unwrap();
        }

        assert!(path.exists());
        for i in 1..=MAX_ROTATIONS {
            assert!(rotation_path(&path, i).exists(), "missing rotation {i}");
        }
        assert!(!rotation_path(&path, MAX_ROTATIONS + 1).exists());
        let current = std::fs::read_to_string(&path).unwrap();
        assert_eq!(current.lines().count(), 1);
        assert!(current.contains("not_found"));
    }
}
