use crate::error::{AutodevError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Info,
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SecurityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Extra directories paths may resolve into. The project root is always allowed.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,
    /// Adds the system temp directory to the allowed roots. Never enable in production.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
}

fn default_max_input_length() -> usize {
    10_000
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            test_mode: false,
            max_input_length: default_max_input_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_backup_count() -> u32 {
    5
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            backup_count: default_backup_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Consent to commit automatically at the end of a workflow.
    #[serde(default)]
    pub auto_commit: bool,
    /// Consent to push after an automatic commit.
    #[serde(default)]
    pub auto_push: bool,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch to push; the current branch when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_push_timeout() -> u64 {
    30
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_commit: false,
            auto_push: false,
            remote: default_remote(),
            branch: None,
            push_timeout_secs: default_push_timeout(),
        }
    }
}

impl GitConfig {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Reject checkpoints whose completed stages are not a prefix of the canonical order.
    #[serde(default)]
    pub strict_stage_order: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            security: SecurityConfig::default(),
            audit: AuditConfig::default(),
            git: GitConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(AutodevError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(AutodevError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.git.push_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "git.push_timeout_secs is 0: every push would time out immediately"
                    .to_string(),
            });
        }

        if self.git.auto_push && !self.git.auto_commit {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "git.auto_push has no effect while git.auto_commit is false".to_string(),
            });
        }

        if self.git.remote.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "git.remote is empty".to_string(),
            });
        }

        for root in &self.security.allowed_roots {
            if root.is_relative() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "security.allowed_roots entry '{}' is relative; it is resolved against the project root",
                        root.display()
                    ),
                });
            }
        }

        if self.security.test_mode {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "security.test_mode is on: the system temp directory is an allowed root"
                    .to_string(),
            });
        }

        if self.security.max_input_length == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "security.max_input_length is 0: all input would be rejected".to_string(),
            });
        }

        if self.audit.backup_count == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Info,
                message: "audit.backup_count is 0: the audit log is truncated on rotation"
                    .to_string(),
            });
        }

        if self.workflow.strict_stage_order {
            warnings.push(ConfigWarning {
                level: WarnLevel::Info,
                message: "workflow.strict_stage_order is on: out-of-order checkpoints are rejected"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
