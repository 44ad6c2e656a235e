use super::Env;
use crate::output::{print_json, print_table, progress_label, stage_list};
use anyhow::Context;
use autodev_core::{
    checkpoint::new_workflow_id,
    types::{parse_stage_list, Stage},
};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum CheckpointSubcommand {
    /// Start a new workflow: generate an id and record researcher as current
    New,
    /// Write (or overwrite) the checkpoint for a workflow
    Create {
        workflow_id: String,
        /// Completed stages in order, comma separated (e.g. researcher,planner)
        #[arg(long, default_value = "")]
        completed: String,
        /// Stage currently in progress
        #[arg(long)]
        current: Option<String>,
        /// Artifact path produced so far (repeatable)
        #[arg(long = "artifact")]
        artifacts: Vec<String>,
    },
    /// Show a workflow's checkpoint
    Show { workflow_id: String },
    /// Print the stages still to run for a workflow
    Resume { workflow_id: String },
    /// List workflows that can be resumed
    List,
    /// Delete a workflow's checkpoint
    Clear { workflow_id: String },
}

pub fn run(root: &Path, subcmd: CheckpointSubcommand, json: bool) -> anyhow::Result<()> {
    let env = Env::load(root)?;
    match subcmd {
        CheckpointSubcommand::New => new(&env, json),
        CheckpointSubcommand::Create {
            workflow_id,
            completed,
            current,
            artifacts,
        } => create(&env, &workflow_id, &completed, current.as_deref(), &artifacts, json),
        CheckpointSubcommand::Show { workflow_id } => show(&env, &workflow_id, json),
        CheckpointSubcommand::Resume { workflow_id } => resume(&env, &workflow_id, json),
        CheckpointSubcommand::List => list(&env, json),
        CheckpointSubcommand::Clear { workflow_id } => clear(&env, &workflow_id, json),
    }
}

fn new(env: &Env, json: bool) -> anyhow::Result<()> {
    let workflow_id = new_workflow_id();
    let cp = env
        .tracker()
        .create_checkpoint(&workflow_id, &[], Some(Stage::Researcher), &[])
        .context("failed to create checkpoint")?;
    if json {
        print_json(&cp)?;
    } else {
        println!("{workflow_id}");
    }
    Ok(())
}

fn create(
    env: &Env,
    workflow_id: &str,
    completed: &str,
    current: Option<&str>,
    artifacts: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let completed = parse_stage_list(completed).context("invalid --completed list")?;
    let current = current
        .map(str::parse::<Stage>)
        .transpose()
        .context("invalid --current stage")?;

    let cp = env
        .tracker()
        .create_checkpoint(workflow_id, &completed, current, artifacts)
        .with_context(|| format!("failed to write checkpoint for '{workflow_id}'"))?;

    if json {
        print_json(&cp)?;
    } else {
        println!(
            "Checkpoint saved: {workflow_id} ({} complete, current: {})",
            progress_label(cp.progress()),
            cp.current_stage
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn show(env: &Env, workflow_id: &str, json: bool) -> anyhow::Result<()> {
    let cp = env
        .tracker()
        .load_checkpoint(workflow_id)
        .with_context(|| format!("cannot load checkpoint '{workflow_id}'"))?;

    if json {
        return print_json(&cp);
    }
    println!("Workflow:  {}", cp.workflow_id);
    println!("Progress:  {}", progress_label(cp.progress()));
    println!("Completed: {}", stage_list(&cp.completed_stages));
    println!(
        "Current:   {}",
        cp.current_stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Remaining: {}", stage_list(&cp.remaining_stages()));
    if !cp.artifacts_created.is_empty() {
        println!("Artifacts:");
        for a in &cp.artifacts_created {
            println!("  {a}");
        }
    }
    println!("Updated:   {}", cp.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

fn resume(env: &Env, workflow_id: &str, json: bool) -> anyhow::Result<()> {
    let plan = env
        .tracker()
        .get_resume_plan(workflow_id)
        .with_context(|| format!("cannot build resume plan for '{workflow_id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "workflow_id": workflow_id,
            "remaining": plan,
        }))?;
    } else if plan.is_empty() {
        println!("Workflow '{workflow_id}' is complete; nothing to resume.");
    } else {
        for stage in &plan {
            println!("{stage}");
        }
    }
    Ok(())
}

fn list(env: &Env, json: bool) -> anyhow::Result<()> {
    let tracker = env.tracker();
    let mut ids: Vec<String> = tracker.list_resumable_workflows().collect();
    ids.sort();

    if json {
        return print_json(&ids);
    }
    if ids.is_empty() {
        println!("No resumable workflows.");
        return Ok(());
    }
    let rows = ids
        .iter()
        .filter_map(|id| tracker.load_checkpoint(id).ok())
        .map(|cp| {
            vec![
                cp.workflow_id.clone(),
                cp.current_stage
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                progress_label(cp.progress()),
            ]
        })
        .collect();
    print_table(&["WORKFLOW", "CURRENT", "PROGRESS"], rows);
    Ok(())
}

fn clear(env: &Env, workflow_id: &str, json: bool) -> anyhow::Result<()> {
    env.tracker()
        .clear_checkpoint(workflow_id)
        .with_context(|| format!("cannot clear checkpoint '{workflow_id}'"))?;
    if json {
        print_json(&serde_json::json!({ "workflow_id": workflow_id, "cleared": true }))?;
    } else {
        println!("Cleared checkpoint: {workflow_id}");
    }
    Ok(())
}
