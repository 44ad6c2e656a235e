use crate::types::Stage;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CLAUDE_DIR: &str = ".claude";
pub const CHECKPOINTS_DIR: &str = ".claude/checkpoints";
pub const ARTIFACTS_DIR: &str = ".claude/artifacts";
pub const LOGS_DIR: &str = ".claude/logs";

pub const CONFIG_FILE: &str = ".claude/autodev.yaml";
pub const AUDIT_LOG_FILE: &str = ".claude/logs/security_audit.log";

pub const CHECKPOINT_EXT: &str = "json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn claude_dir(root: &Path) -> PathBuf {
    root.join(CLAUDE_DIR)
}

pub fn checkpoints_dir(root: &Path) -> PathBuf {
    root.join(CHECKPOINTS_DIR)
}

pub fn checkpoint_path(root: &Path, workflow_id: &str) -> PathBuf {
    checkpoints_dir(root).join(format!("{workflow_id}.{CHECKPOINT_EXT}"))
}

pub fn artifacts_dir(root: &Path) -> PathBuf {
    root.join(ARTIFACTS_DIR)
}

pub fn workflow_artifacts_dir(root: &Path, workflow_id: &str) -> PathBuf {
    artifacts_dir(root).join(workflow_id)
}

pub fn artifact_path(root: &Path, workflow_id: &str, stage: Stage) -> PathBuf {
    workflow_artifacts_dir(root, workflow_id).join(format!("{}.json", stage.as_str()))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn audit_log_path(root: &Path) -> PathBuf {
    root.join(AUDIT_LOG_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
