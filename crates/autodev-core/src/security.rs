//! Input validation at the boundary between the orchestrator and the filesystem.
//!
//! Every check is whitelist based and audit logged. Failures are always
//! [`AutodevError::Validation`] and are never corrected silently.

use crate::audit::{AuditLog, AuditStatus};
use crate::config::Config;
use crate::error::{AutodevError, Result};
use regex::Regex;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

pub const MAX_AGENT_NAME_LEN: usize = 256;
pub const MIN_ISSUE_NUMBER: i64 = 1;
pub const MAX_ISSUE_NUMBER: i64 = 999_999;

static AGENT_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn agent_name_re() -> &'static Regex {
    AGENT_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

// ---------------------------------------------------------------------------
// SecurityContext
// ---------------------------------------------------------------------------

/// Ambient state the validators need: where paths may point and where audit
/// records go. Built once per process and passed explicitly.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    project_root: PathBuf,
    allowed_roots: Vec<PathBuf>,
    test_mode: bool,
    max_input_length: usize,
    audit: AuditLog,
}

impl SecurityContext {
    /// Build a context rooted at `root`. The root must exist; it is
    /// canonicalized so that later prefix checks compare like with like.
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        let project_root = root.canonicalize()?;
        let allowed_roots = config
            .security
            .allowed_roots
            .iter()
            .map(|p| {
                let abs = if p.is_relative() {
                    project_root.join(p)
                } else {
                    p.clone()
                };
                abs.canonicalize().unwrap_or(abs)
            })
            .collect();
        Ok(Self {
            audit: AuditLog::for_root(&project_root, &config.audit),
            project_root,
            allowed_roots,
            test_mode: config.security.test_mode,
            max_input_length: config.security.max_input_length,
        })
    }

    /// Enable or disable the temp-directory relaxation explicitly.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    /// Every directory a validated path may resolve into.
    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.project_root.clone()];
        roots.extend(self.allowed_roots.iter().cloned());
        if self.test_mode {
            let tmp = std::env::temp_dir();
            roots.push(tmp.canonicalize().unwrap_or(tmp));
        }
        roots
    }

    /// Append an audit record. Never fails.
    pub fn audit_log(&self, event_type: &str, status: AuditStatus, context: serde_json::Value) {
        self.audit.record(event_type, status, context);
    }

    fn reject<T>(
        &self,
        event_type: &str,
        purpose: &str,
        what: String,
        expected: &str,
        mut context: serde_json::Value,
    ) -> Result<T> {
        if let Some(obj) = context.as_object_mut() {
            obj.insert("purpose".to_string(), json!(purpose));
            obj.insert("error".to_string(), json!(what));
        }
        self.audit_log(event_type, AuditStatus::Failure, context);
        Err(AutodevError::validation(what, expected))
    }

    // -----------------------------------------------------------------------
    // validate_path
    // -----------------------------------------------------------------------

    /// Validate a path and return its canonical form.
    ///
    /// Relative paths resolve against the project root. Rejects `..`
    /// segments, symlinks, anything outside [`allowed_roots`](Self::allowed_roots),
    /// and (unless `allow_missing`) paths that do not exist.
    pub fn validate_path(
        &self,
        path: impl AsRef<Path>,
        purpose: &str,
        allow_missing: bool,
    ) -> Result<PathBuf> {
        const EVENT: &str = "path_validation";
        let path = path.as_ref();
        let shown = path.display().to_string();
        let ctx = json!({ "path": shown });

        if path.as_os_str().is_empty() {
            return self.reject(
                EVENT,
                purpose,
                format!("empty path for {purpose}"),
                "a non-empty path",
                ctx,
            );
        }

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return self.reject(
                EVENT,
                purpose,
                format!("path traversal attempt in '{shown}' for {purpose}"),
                "a path without '..' segments",
                ctx,
            );
        }

        let absolute = if path.is_relative() {
            self.project_root.join(path)
        } else {
            path.to_path_buf()
        };

        let canonical = match std::fs::symlink_metadata(&absolute) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return self.reject(
                    EVENT,
                    purpose,
                    format!("'{shown}' is a symlink ({purpose})"),
                    "a regular file or directory, not a symlink",
                    ctx,
                );
            }
            Ok(_) => absolute.canonicalize()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !allow_missing {
                    return self.reject(
                        EVENT,
                        purpose,
                        format!("'{shown}' does not exist ({purpose})"),
                        "an existing path",
                        ctx,
                    );
                }
                if let Some(link) = symlinked_ancestor(&absolute) {
                    return self.reject(
                        EVENT,
                        purpose,
                        format!(
                            "'{shown}' passes through symlink '{}' ({purpose})",
                            link.display()
                        ),
                        "a regular file or directory, not a symlink",
                        ctx,
                    );
                }
                canonicalize_missing(&absolute)?
            }
            Err(e) => return Err(e.into()),
        };

        let roots = self.allowed_roots();
        if !roots.iter().any(|root| canonical.starts_with(root)) {
            let expected = format!(
                "a path inside {}",
                roots
                    .iter()
                    .map(|r| r.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            );
            return self.reject(
                EVENT,
                purpose,
                format!("'{shown}' resolves outside the allowed directories ({purpose})"),
                &expected,
                ctx,
            );
        }

        self.audit_log(
            EVENT,
            AuditStatus::Success,
            json!({ "path": shown, "resolved": canonical.display().to_string(), "purpose": purpose }),
        );
        Ok(canonical)
    }

    // -----------------------------------------------------------------------
    // validate_agent_name
    // -----------------------------------------------------------------------

    /// Names end up in file paths and command lines, so only
    /// `[A-Za-z0-9_-]` is accepted.
    pub fn validate_agent_name<'a>(&self, name: &'a str, purpose: &str) -> Result<&'a str> {
        const EVENT: &str = "agent_name_validation";
        const EXPECTED: &str = "1-256 characters from [A-Za-z0-9_-]";
        let ctx = json!({ "name": truncate_for_log(name) });

        if name.is_empty() || name.chars().count() > MAX_AGENT_NAME_LEN {
            return self.reject(
                EVENT,
                purpose,
                format!(
                    "name for {purpose} has invalid length {}",
                    name.chars().count()
                ),
                EXPECTED,
                ctx,
            );
        }
        if !agent_name_re().is_match(name) {
            return self.reject(
                EVENT,
                purpose,
                format!("name '{}' for {purpose} contains disallowed characters", truncate_for_log(name)),
                EXPECTED,
                ctx,
            );
        }

        self.audit_log(
            EVENT,
            AuditStatus::Success,
            json!({ "name": name, "purpose": purpose }),
        );
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // validate_github_issue
    // -----------------------------------------------------------------------

    pub fn validate_github_issue(&self, number: i64, purpose: &str) -> Result<u32> {
        const EVENT: &str = "github_issue_validation";
        if !(MIN_ISSUE_NUMBER..=MAX_ISSUE_NUMBER).contains(&number) {
            return self.reject(
                EVENT,
                purpose,
                format!("issue number {number} for {purpose} is out of range"),
                "an integer between 1 and 999999",
                json!({ "number": number }),
            );
        }
        self.audit_log(
            EVENT,
            AuditStatus::Success,
            json!({ "number": number, "purpose": purpose }),
        );
        // Range checked above.
        Ok(number as u32)
    }

    // -----------------------------------------------------------------------
    // validate_input_length / validate_message
    // -----------------------------------------------------------------------

    /// Single-line free text: bounded length and no control characters at all.
    pub fn validate_input_length<'a>(
        &self,
        text: &'a str,
        max_length: usize,
        field_name: &str,
        purpose: &str,
    ) -> Result<&'a str> {
        self.check_text(text, max_length, field_name, purpose, |_| false)
    }

    /// Multi-line free text such as a commit message: newlines and tabs are
    /// allowed, every other control character is not.
    pub fn validate_message<'a>(
        &self,
        text: &'a str,
        max_length: usize,
        field_name: &str,
        purpose: &str,
    ) -> Result<&'a str> {
        self.check_text(text, max_length, field_name, purpose, |c| {
            c == '\n' || c == '\t'
        })
    }

    fn check_text<'a>(
        &self,
        text: &'a str,
        max_length: usize,
        field_name: &str,
        purpose: &str,
        allowed_control: impl Fn(char) -> bool,
    ) -> Result<&'a str> {
        const EVENT: &str = "input_validation";
        let len = text.chars().count();
        if len > max_length {
            return self.reject(
                EVENT,
                purpose,
                format!("{field_name} for {purpose} is {len} characters long"),
                &format!("at most {max_length} characters"),
                json!({ "field": field_name, "length": len }),
            );
        }
        if let Some(bad) = text.chars().find(|&c| c.is_control() && !allowed_control(c)) {
            return self.reject(
                EVENT,
                purpose,
                format!(
                    "{field_name} for {purpose} contains control character {:?}",
                    bad
                ),
                "text without control characters",
                json!({ "field": field_name, "length": len }),
            );
        }
        self.audit_log(
            EVENT,
            AuditStatus::Success,
            json!({ "field": field_name, "length": len, "purpose": purpose }),
        );
        Ok(text)
    }
}

/// The first component of a missing path's unresolved tail that is itself a
/// symlink. A dangling link reports as missing, so `exists()` alone would let
/// it through unresolved.
fn symlinked_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .take_while(|p| !p.exists())
        .find(|p| {
            std::fs::symlink_metadata(p).is_ok_and(|m| m.file_type().is_symlink())
        })
        .map(Path::to_path_buf)
}

/// Canonicalize a path that does not exist yet by resolving its closest
/// existing ancestor and re-attaching the missing tail. Callers reject
/// symlinks in the tail first (see `symlinked_ancestor`).
fn canonicalize_missing(path: &Path) -> Result<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_owned());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing.canonicalize()?;
    for part in tail.iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

fn truncate_for_log(s: &str) -> String {
    s.chars().take(64).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
