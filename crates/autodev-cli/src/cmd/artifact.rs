use super::Env;
use crate::output::{print_json, print_table};
use anyhow::Context;
use autodev_core::types::{ArtifactStatus, Stage};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ArtifactSubcommand {
    /// Write a stage's artifact (replaces any earlier one)
    Write {
        workflow_id: String,
        stage: String,
        /// in_progress, completed or failed
        #[arg(long, default_value = "completed")]
        status: String,
        /// Read the JSON payload from this file
        #[arg(long, conflicts_with = "payload")]
        file: Option<PathBuf>,
        /// Inline JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Show a stage's artifact
    Show { workflow_id: String, stage: String },
    /// List the artifacts recorded for a workflow
    List { workflow_id: String },
}

pub fn run(root: &Path, subcmd: ArtifactSubcommand, json: bool) -> anyhow::Result<()> {
    let env = Env::load(root)?;
    match subcmd {
        ArtifactSubcommand::Write {
            workflow_id,
            stage,
            status,
            file,
            payload,
        } => write(&env, &workflow_id, &stage, &status, file, payload, json),
        ArtifactSubcommand::Show { workflow_id, stage } => show(&env, &workflow_id, &stage),
        ArtifactSubcommand::List { workflow_id } => list(&env, &workflow_id, json),
    }
}

fn write(
    env: &Env,
    workflow_id: &str,
    stage_str: &str,
    status_str: &str,
    file: Option<PathBuf>,
    payload: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let stage: Stage = stage_str
        .parse()
        .with_context(|| format!("unknown stage: {stage_str}"))?;
    let status: ArtifactStatus = status_str
        .parse()
        .with_context(|| format!("unknown status: {status_str}"))?;

    let raw = match (file, payload) {
        (Some(path), _) => {
            let path = env
                .security
                .validate_path(&path, "artifact payload", false)
                .context("payload file rejected")?;
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?
        }
        (None, Some(inline)) => inline,
        (None, None) => "{}".to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("payload is not valid JSON")?;

    let (artifact, path) = env
        .artifacts()
        .write_artifact(workflow_id, stage, status, value)
        .with_context(|| format!("failed to write artifact {workflow_id}/{stage}"))?;

    if json {
        print_json(&serde_json::json!({
            "workflow_id": artifact.workflow_id,
            "agent": artifact.stage,
            "status": artifact.status,
            "path": path,
        }))?;
    } else {
        println!("Wrote: {}", path.display());
    }
    Ok(())
}

fn show(env: &Env, workflow_id: &str, stage_str: &str) -> anyhow::Result<()> {
    let stage: Stage = stage_str
        .parse()
        .with_context(|| format!("unknown stage: {stage_str}"))?;
    let artifact = env
        .artifacts()
        .read_artifact(workflow_id, stage)
        .with_context(|| format!("cannot load artifact {workflow_id}/{stage}"))?;
    // Artifacts are JSON documents either way.
    print_json(&artifact)
}

fn list(env: &Env, workflow_id: &str, json: bool) -> anyhow::Result<()> {
    let artifacts = env
        .artifacts()
        .list_artifacts(workflow_id)
        .with_context(|| format!("cannot list artifacts for '{workflow_id}'"))?;

    if json {
        return print_json(&artifacts);
    }
    if artifacts.is_empty() {
        println!("No artifacts for '{workflow_id}'.");
        return Ok(());
    }
    let rows = artifacts
        .iter()
        .map(|a| {
            vec![
                a.stage.to_string(),
                a.status.to_string(),
                a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(&["STAGE", "STATUS", "CREATED"], rows);
    Ok(())
}
