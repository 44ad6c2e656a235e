//! Consent-gated git automation with graceful degradation.
//!
//! Environmental problems (no git, no identity, conflicts, network) never
//! surface as `Err`; they become [`GitOutcome::Failed`] or, once a commit
//! exists, [`GitOutcome::CommittedOnly`]. A failed push never undoes a
//! successful commit.

use crate::audit::AuditStatus;
use crate::config::GitConfig;
use crate::error::{AutodevError, Result};
use crate::security::SecurityContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single helper step: `Err` carries a message that says what
/// went wrong, what was expected, and how to recover by hand.
pub type GitStep = std::result::Result<(), String>;

const CONFLICT_CODES: &[&str] = &["UU", "AA", "DD", "AU", "UA", "DU", "UD"];

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// What git said about a failure: stderr, else stdout, else the exit code.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GitRunError {
    #[error("git executable not found")]
    Missing,

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Executes one git invocation. The seam tests use to script git.
#[async_trait]
pub trait GitRunner: Send + Sync {
    fn is_available(&self) -> bool;

    async fn run(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> std::result::Result<GitOutput, GitRunError>;
}

/// Runs the `git` binary found on `PATH` inside `repo`.
#[derive(Debug, Clone)]
pub struct SystemGit {
    repo: PathBuf,
    program: PathBuf,
}

impl SystemGit {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: PathBuf::from("git"),
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl GitRunner for SystemGit {
    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn run(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> std::result::Result<GitOutput, GitRunError> {
        tracing::debug!(?args, repo = %self.repo.display(), "git");
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.repo)
            // Never wait on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let fut = cmd.output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| GitRunError::TimedOut(limit))?,
            None => fut.await,
        }
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GitRunError::Missing,
            _ => GitRunError::Io(e),
        })?;

        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GitOutcome {
    Failed {
        reason: String,
    },
    CommittedOnly {
        sha: String,
        /// Why the push did not happen; `None` when no push was requested.
        push_error: Option<String>,
    },
    CommittedAndPushed {
        sha: String,
    },
}

impl GitOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        GitOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, GitOutcome::Failed { .. })
    }

    pub fn sha(&self) -> Option<&str> {
        match self {
            GitOutcome::Failed { .. } => None,
            GitOutcome::CommittedOnly { sha, .. } | GitOutcome::CommittedAndPushed { sha } => {
                Some(sha)
            }
        }
    }
}

/// The flat contract handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOperationResult {
    pub success: bool,
    pub commit_sha: Option<String>,
    pub pushed: bool,
    pub error: Option<String>,
}

impl From<&GitOutcome> for GitOperationResult {
    fn from(outcome: &GitOutcome) -> Self {
        match outcome {
            GitOutcome::Failed { reason } => Self {
                success: false,
                commit_sha: None,
                pushed: false,
                error: Some(reason.clone()),
            },
            GitOutcome::CommittedOnly { sha, push_error } => Self {
                success: true,
                commit_sha: Some(sha.clone()),
                pushed: false,
                error: push_error.clone(),
            },
            GitOutcome::CommittedAndPushed { sha } => Self {
                success: true,
                commit_sha: Some(sha.clone()),
                pushed: true,
                error: None,
            },
        }
    }
}

impl From<GitOutcome> for GitOperationResult {
    fn from(outcome: GitOutcome) -> Self {
        (&outcome).into()
    }
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GitConsent {
    pub auto_commit: bool,
    pub auto_push: bool,
}

impl From<&GitConfig> for GitConsent {
    fn from(cfg: &GitConfig) -> Self {
        Self {
            auto_commit: cfg.auto_commit,
            auto_push: cfg.auto_push,
        }
    }
}

// ---------------------------------------------------------------------------
// GitOps
// ---------------------------------------------------------------------------

pub struct GitOps<R: GitRunner> {
    runner: R,
    remote: String,
    push_timeout: Duration,
    security: Option<SecurityContext>,
}

impl GitOps<SystemGit> {
    /// Real git in `repo`, configured from `cfg`.
    pub fn system(repo: &Path, cfg: &GitConfig) -> Self {
        GitOps::new(SystemGit::new(repo))
            .with_remote(cfg.remote.clone())
            .with_push_timeout(cfg.push_timeout())
    }
}

impl<R: GitRunner> GitOps<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            remote: "origin".to_string(),
            push_timeout: Duration::from_secs(30),
            security: None,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Validate commit messages and audit every auto-commit through `security`.
    pub fn with_security(mut self, security: SecurityContext) -> Self {
        self.security = Some(security);
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn git(&self, args: &[&str]) -> Option<GitOutput> {
        match self.runner.run(args, None).await {
            Ok(out) => Some(out),
            Err(e) => {
                tracing::warn!(?args, "git invocation failed: {e}");
                None
            }
        }
    }

    async fn config_value(&self, key: &str) -> Option<String> {
        let out = self.git(&["config", "--get", key]).await?;
        let value = out.stdout.trim();
        (out.success && !value.is_empty()).then(|| value.to_string())
    }

    async fn porcelain_status(&self) -> Option<String> {
        let out = self.git(&["status", "--porcelain"]).await?;
        out.success.then_some(out.stdout)
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    pub async fn validate_git_repo(&self) -> GitStep {
        if !self.runner.is_available() {
            return Err(
                "git is not installed or not on PATH; expected a git executable; install git and retry"
                    .to_string(),
            );
        }
        let inside = match self
            .runner
            .run(&["rev-parse", "--is-inside-work-tree"], None)
            .await
        {
            Ok(out) => out,
            Err(GitRunError::Missing) => {
                return Err(
                    "git is not installed or not on PATH; expected a git executable; install git and retry"
                        .to_string(),
                )
            }
            Err(e) => return Err(format!("could not run git: {e}; retry manually with: git status")),
        };
        if !inside.success || inside.stdout.trim() != "true" {
            return Err(format!(
                "not a git repository ({}); expected a git work tree; initialize one with: git init",
                inside.detail()
            ));
        }
        match self.runner.run(&["status", "--porcelain"], None).await {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(format!(
                "git repository appears corrupted ({}); expected a readable index; inspect with: git fsck",
                out.detail()
            )),
            Err(e) => Err(format!(
                "git repository appears corrupted ({e}); expected a readable index; inspect with: git fsck"
            )),
        }
    }

    pub async fn check_git_config(&self) -> GitStep {
        let mut missing = Vec::new();
        if self.config_value("user.name").await.is_none() {
            missing.push("user.name");
        }
        if self.config_value("user.email").await.is_none() {
            missing.push("user.email");
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(format!(
            "git {} not set; expected a configured commit identity; set it with: git config user.name \"Your Name\" && git config user.email you@example.com",
            missing.join(" and ")
        ))
    }

    pub async fn detect_merge_conflict(&self) -> bool {
        let Some(status) = self.porcelain_status().await else {
            return false;
        };
        status
            .lines()
            .filter_map(|line| line.get(..2))
            .any(|code| CONFLICT_CODES.contains(&code))
    }

    pub async fn is_detached_head(&self) -> bool {
        match self.git(&["symbolic-ref", "-q", "HEAD"]).await {
            Some(out) => !out.success,
            None => false,
        }
    }

    pub async fn has_uncommitted_changes(&self) -> bool {
        self.porcelain_status()
            .await
            .is_some_and(|s| !s.trim().is_empty())
    }

    pub async fn current_branch(&self) -> Option<String> {
        let out = self.git(&["symbolic-ref", "--short", "-q", "HEAD"]).await?;
        let branch = out.stdout.trim();
        (out.success && !branch.is_empty()).then(|| branch.to_string())
    }

    pub async fn head_sha(&self) -> Option<String> {
        let out = self.git(&["rev-parse", "HEAD"]).await?;
        let sha = out.stdout.trim();
        (out.success && !sha.is_empty()).then(|| sha.to_string())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn stage_all_changes(&self) -> GitStep {
        match self.runner.run(&["add", "-A"], None).await {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(format!(
                "staging failed ({}); expected all changes to be staged; stage manually with: git add -A",
                out.detail()
            )),
            Err(e) => Err(format!(
                "staging failed ({e}); expected all changes to be staged; stage manually with: git add -A"
            )),
        }
    }

    pub async fn commit_changes(&self, message: &str) -> GitStep {
        // `diff --cached --quiet` exits 0 when nothing is staged.
        match self.runner.run(&["diff", "--cached", "--quiet"], None).await {
            Ok(out) if out.success => {
                return Err(
                    "nothing staged to commit; expected staged changes; stage them with: git add -A"
                        .to_string(),
                )
            }
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "could not inspect staged changes ({e}); commit manually with: git commit"
                ))
            }
        }
        match self.runner.run(&["commit", "-m", message], None).await {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(format!(
                "commit rejected ({}); expected the commit to be accepted; fix the problem and commit manually with: git commit",
                out.detail()
            )),
            Err(e) => Err(format!(
                "commit failed ({e}); commit manually with: git commit"
            )),
        }
    }

    /// Push `branch` to `remote`, bounded by the push timeout. A timeout is
    /// returned as an ordinary error message.
    pub async fn push_to_remote(&self, branch: &str, remote: &str) -> GitStep {
        let manual = format!("push manually with: git push {remote} {branch}");
        if branch.is_empty() || branch.starts_with('-') || remote.is_empty() || remote.starts_with('-')
        {
            return Err(format!(
                "refusing to push '{branch}' to '{remote}'; expected a branch and remote name that do not start with '-'; {manual}"
            ));
        }
        match self
            .runner
            .run(&["push", remote, branch], Some(self.push_timeout))
            .await
        {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(format!(
                "push to {remote}/{branch} failed ({}); {manual}",
                out.detail()
            )),
            Err(GitRunError::TimedOut(limit)) => Err(format!(
                "push to {remote}/{branch} timed out after {}s; {manual}",
                limit.as_secs()
            )),
            Err(e) => Err(format!("push to {remote}/{branch} failed ({e}); {manual}")),
        }
    }

    // -----------------------------------------------------------------------
    // Orchestration
    // -----------------------------------------------------------------------

    /// validate → config → conflicts / detached HEAD → stage → commit → push.
    ///
    /// Only a malformed commit message is an `Err`. Everything else is an
    /// outcome; a push failure after a commit is `CommittedOnly`.
    pub async fn auto_commit_and_push(
        &self,
        message: &str,
        branch: Option<&str>,
        push: bool,
    ) -> Result<GitOutcome> {
        if message.trim().is_empty() {
            return Err(AutodevError::validation(
                "commit message is empty",
                "a non-empty commit message",
            ));
        }
        if let Some(sec) = &self.security {
            sec.validate_message(
                message,
                sec.max_input_length(),
                "commit message",
                "auto-commit",
            )?;
        }

        let outcome = self.run_pipeline(message, branch, push).await;
        self.audit(&outcome, branch, push);
        Ok(outcome)
    }

    /// [`auto_commit_and_push`](Self::auto_commit_and_push) behind the consent gate.
    pub async fn auto_commit_with_consent(
        &self,
        message: &str,
        branch: Option<&str>,
        push_requested: bool,
        consent: GitConsent,
    ) -> Result<GitOutcome> {
        if !consent.auto_commit {
            let outcome = GitOutcome::failed(
                "auto-commit consent not given; expected git.auto_commit: true in .claude/autodev.yaml; commit manually with: git add -A && git commit",
            );
            self.audit(&outcome, branch, false);
            return Ok(outcome);
        }
        let push = push_requested && consent.auto_push;
        if push_requested && !consent.auto_push {
            tracing::info!("push requested but git.auto_push is not enabled; committing only");
        }
        self.auto_commit_and_push(message, branch, push).await
    }

    async fn run_pipeline(&self, message: &str, branch: Option<&str>, push: bool) -> GitOutcome {
        if let Err(reason) = self.validate_git_repo().await {
            return GitOutcome::failed(reason);
        }
        if let Err(reason) = self.check_git_config().await {
            return GitOutcome::failed(reason);
        }
        if self.detect_merge_conflict().await {
            return GitOutcome::failed(
                "merge conflict detected; expected a clean merge state; resolve the conflicts, then commit manually with: git add -A && git commit",
            );
        }
        if self.is_detached_head().await {
            return GitOutcome::failed(
                "HEAD is detached; expected a checked-out branch; switch with: git checkout <branch>",
            );
        }
        if !self.has_uncommitted_changes().await {
            return GitOutcome::failed(
                "no changes to commit; expected modified or new files in the work tree; check with: git status",
            );
        }
        if let Err(reason) = self.stage_all_changes().await {
            return GitOutcome::failed(reason);
        }
        if let Err(reason) = self.commit_changes(message).await {
            return GitOutcome::failed(reason);
        }

        let sha = match self.head_sha().await {
            Some(sha) => sha,
            None => {
                tracing::warn!("commit succeeded but HEAD could not be read");
                "unknown".to_string()
            }
        };
        tracing::info!(%sha, "committed");

        if !push {
            return GitOutcome::CommittedOnly {
                sha,
                push_error: None,
            };
        }

        let branch = match branch {
            Some(b) => b.to_string(),
            None => match self.current_branch().await {
                Some(b) => b,
                None => {
                    return GitOutcome::CommittedOnly {
                        sha,
                        push_error: Some(
                            "could not determine the current branch; push manually with: git push"
                                .to_string(),
                        ),
                    }
                }
            },
        };

        match self.push_to_remote(&branch, &self.remote).await {
            Ok(()) => {
                tracing::info!(%sha, remote = %self.remote, %branch, "pushed");
                GitOutcome::CommittedAndPushed { sha }
            }
            Err(e) => {
                tracing::warn!(%sha, "push failed, commit kept: {e}");
                GitOutcome::CommittedOnly {
                    sha,
                    push_error: Some(e),
                }
            }
        }
    }

    fn audit(&self, outcome: &GitOutcome, branch: Option<&str>, push: bool) {
        let Some(sec) = &self.security else {
            return;
        };
        let status = if outcome.is_success() {
            AuditStatus::Success
        } else {
            AuditStatus::Failure
        };
        let result = GitOperationResult::from(outcome);
        sec.audit_log(
            "git_auto_commit",
            status,
            json!({
                "branch": branch,
                "remote": self.remote,
                "push_requested": push,
                "result": result,
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
