//! Append-only security audit log.
//!
//! One JSON object per line: `{timestamp, event_type, status, context}`.
//! Writing is best-effort; a failure is reported through `tracing` and never
//! propagated, so an unwritable log cannot block a validation or a commit.

use crate::config::AuditConfig;
use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub status: AuditStatus,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, config: &AuditConfig) -> Self {
        Self {
            path: path.into(),
            max_bytes: config.max_bytes,
            backup_count: config.backup_count,
        }
    }

    /// The audit log at its standard location under `root`.
    pub fn for_root(root: &Path, config: &AuditConfig) -> Self {
        Self::new(paths::audit_log_path(root), config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Never fails.
    pub fn record(&self, event_type: &str, status: AuditStatus, context: serde_json::Value) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            status,
            context,
        };
        if let Err(e) = self.append(&record) {
            tracing::warn!(
                path = %self.path.display(),
                event_type,
                "failed to write audit record: {e}"
            );
        }
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.rotate_if_needed(line.len() as u64)?;
        crate::io::append_text(&self.path, &line)
    }

    fn rotate_if_needed(&self, incoming: u64) -> Result<()> {
        let current = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if current == 0 || current + incoming <= self.max_bytes {
            return Ok(());
        }

        if self.backup_count == 0 {
            std::fs::remove_file(&self.path)?;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for n in (1..self.backup_count).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;
        tracing::debug!(path = %self.path.display(), "rotated audit log");
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    /// The last `limit` records of the live log file, oldest first.
    /// Lines that fail to parse are skipped.
    pub fn tail(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let records: Vec<AuditRecord> = data
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn log_in(dir: &TempDir, max_bytes: u64, backup_count: u32) -> AuditLog {
        AuditLog::new(
            dir.path().join("logs/security_audit.log"),
            &AuditConfig {
                max_bytes,
                backup_count,
            },
        )
    }

    #[test]
    fn records_are_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir, 1024 * 1024, 5);
        log.record("path_validation", AuditStatus::Success, json!({"path": "docs"}));
        log.record("agent_name_validation", AuditStatus::Failure, json!({"name": "a b"}));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);

        let records = log.tail(10).unwrap();
        assert_eq!(records[0].event_type, "path_validation");
        assert_eq!(records[1].status, AuditStatus::Failure);
        assert_eq!(records[1].context["name"], "a b");
    }

    #[test]
    fn tail_limits_to_most_recent() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir, 1024 * 1024, 5);
        for i in 0..5 {
            log.record("event", AuditStatus::Success, json!({ "i": i }));
        }
        let records = log.tail(2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].context["i"], 3);
        assert_eq!(records[1].context["i"], 4);
    }

    #[test]
    fn rotation_keeps_bounded_backups() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir, 200, 2);
        for i in 0..20 {
            log.record("event", AuditStatus::Success, json!({ "i": i }));
        }
        let base = log.path().to_path_buf();
        assert!(base.exists());
        assert!(log.backup_path(1).exists());
        assert!(log.backup_path(2).exists());
        assert!(!log.backup_path(3).exists());
        assert!(std::fs::metadata(&base).unwrap().len() <= 200);
    }

    #[test]
    fn unwritable_log_does_not_panic() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every append fail.
        let path = dir.path().join("audit.log");
        std::fs::create_dir_all(&path).unwrap();
        let log = AuditLog::new(&path, &AuditConfig::default());
        log.record("event", AuditStatus::Success, json!({}));
    }
}
