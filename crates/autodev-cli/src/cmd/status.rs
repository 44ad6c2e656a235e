use super::Env;
use crate::output::{print_json, print_table, progress_label, stage_list};
use autodev_core::{checkpoint::Checkpoint, types::Stage};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let env = Env::load(root)?;
    let tracker = env.tracker();

    let mut checkpoints: Vec<Checkpoint> = tracker
        .list_resumable_workflows()
        .filter_map(|id| tracker.load_checkpoint(&id).ok())
        .collect();
    checkpoints.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if json {
        #[derive(serde::Serialize)]
        struct WorkflowStatus<'a> {
            workflow_id: &'a str,
            current_stage: Option<Stage>,
            completed: usize,
            total: usize,
            next_stage: Option<Stage>,
            next: Vec<Stage>,
            validation_pending: Vec<Stage>,
        }

        let out: Vec<WorkflowStatus> = checkpoints
            .iter()
            .map(|cp| {
                let (completed, total) = cp.progress();
                let next = cp.remaining_stages();
                WorkflowStatus {
                    workflow_id: &cp.workflow_id,
                    current_stage: cp.current_stage,
                    completed,
                    total,
                    next_stage: cp.next_stage(),
                    validation_pending: next.iter().copied().filter(|s| s.is_validation()).collect(),
                    next,
                }
            })
            .collect();
        return print_json(&serde_json::json!({
            "resumable": out,
            "auto_commit": env.config.git.auto_commit,
            "auto_push": env.config.git.auto_push,
        }));
    }

    if checkpoints.is_empty() {
        println!("No workflows in progress.");
    } else {
        let rows = checkpoints
            .iter()
            .map(|cp| {
                let remaining = cp.remaining_stages();
                let (validation, other): (Vec<Stage>, Vec<Stage>) =
                    remaining.iter().copied().partition(|s| s.is_validation());
                vec![
                    cp.workflow_id.clone(),
                    progress_label(cp.progress()),
                    stage_list(&other),
                    stage_list(&validation),
                ]
            })
            .collect();
        print_table(&["WORKFLOW", "PROGRESS", "REMAINING", "VALIDATION"], rows);
    }

    println!(
        "\nAuto-commit: {}  Auto-push: {}",
        on_off(env.config.git.auto_commit),
        on_off(env.config.git.auto_push)
    );
    Ok(())
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}
