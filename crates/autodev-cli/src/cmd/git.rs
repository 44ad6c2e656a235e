use super::Env;
use crate::output::print_json;
use anyhow::Context;
use autodev_core::git::{GitConsent, GitOperationResult, GitOps, GitOutcome, SystemGit};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum GitSubcommand {
    /// Report repository readiness for an automatic commit
    Status,
    /// Stage everything and commit (and push, when consented)
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
        /// Branch to push (default: git.branch, then the current branch)
        #[arg(long)]
        branch: Option<String>,
        /// Commit only, even if git.auto_push is enabled
        #[arg(long)]
        no_push: bool,
    },
}

pub fn run(root: &Path, subcmd: GitSubcommand, json: bool) -> anyhow::Result<()> {
    let env = Env::load(root)?;
    let ops = GitOps::system(env.security.project_root(), &env.config.git)
        .with_security(env.security.clone());
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match subcmd {
        GitSubcommand::Status => rt.block_on(status(&ops, json)),
        GitSubcommand::Commit {
            message,
            branch,
            no_push,
        } => {
            let branch = branch.or_else(|| env.config.git.branch.clone());
            let consent = GitConsent::from(&env.config.git);
            rt.block_on(commit(&ops, &message, branch.as_deref(), !no_push, consent, json))
        }
    }
}

async fn status(ops: &GitOps<SystemGit>, json: bool) -> anyhow::Result<()> {
    let repo = ops.validate_git_repo().await;
    let (identity, conflict, detached, dirty, branch) = if repo.is_ok() {
        (
            ops.check_git_config().await,
            ops.detect_merge_conflict().await,
            ops.is_detached_head().await,
            ops.has_uncommitted_changes().await,
            ops.current_branch().await,
        )
    } else {
        (Ok(()), false, false, false, None)
    };

    if json {
        return print_json(&serde_json::json!({
            "repo_valid": repo.is_ok(),
            "repo_error": repo.as_ref().err(),
            "config_valid": identity.is_ok(),
            "config_error": identity.as_ref().err(),
            "merge_conflict": conflict,
            "detached_head": detached,
            "uncommitted_changes": dirty,
            "branch": branch,
            "remote": ops.remote(),
        }));
    }

    match &repo {
        Ok(()) => println!("Repository:  ok"),
        Err(e) => {
            println!("Repository:  {e}");
            return Ok(());
        }
    }
    match &identity {
        Ok(()) => println!("Identity:    ok"),
        Err(e) => println!("Identity:    {e}"),
    }
    println!(
        "Branch:      {}",
        branch.as_deref().unwrap_or("(detached)")
    );
    println!("Remote:      {}", ops.remote());
    println!("Conflicts:   {}", if conflict { "yes" } else { "no" });
    println!("Changes:     {}", if dirty { "yes" } else { "no" });
    if detached {
        println!("Warning:     HEAD is detached; auto-commit will refuse to run");
    }
    Ok(())
}

async fn commit(
    ops: &GitOps<SystemGit>,
    message: &str,
    branch: Option<&str>,
    push: bool,
    consent: GitConsent,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = ops
        .auto_commit_with_consent(message, branch, push, consent)
        .await
        .context("commit message rejected")?;
    let result = GitOperationResult::from(&outcome);

    if json {
        return print_json(&result);
    }
    // Git failures are reported, not raised: the workflow itself still succeeded.
    match &outcome {
        GitOutcome::Failed { reason } => println!("Not committed: {reason}"),
        GitOutcome::CommittedOnly { sha, push_error } => {
            println!("Committed: {sha}");
            match push_error {
                Some(e) => println!("Not pushed: {e}"),
                None => println!("Not pushed (push not requested or not consented)"),
            }
        }
        GitOutcome::CommittedAndPushed { sha } => {
            println!("Committed: {sha}");
            println!("Pushed to {}", ops.remote());
        }
    }
    Ok(())
}
