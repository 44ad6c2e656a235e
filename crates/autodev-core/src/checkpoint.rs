use crate::config::WorkflowConfig;
use crate::error::{AutodevError, Result};
use crate::paths;
use crate::security::SecurityContext;
use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generate a fresh workflow id, e.g. `20261017-142233-1a2b3c4d`.
pub fn new_workflow_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..8])
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: String,
    #[serde(rename = "completed_agents")]
    pub completed_stages: Vec<Stage>,
    #[serde(rename = "current_agent")]
    pub current_stage: Option<Stage>,
    #[serde(default)]
    pub artifacts_created: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Stages not yet completed, in canonical order.
    pub fn remaining_stages(&self) -> Vec<Stage> {
        Stage::all()
            .iter()
            .copied()
            .filter(|s| !self.completed_stages.contains(s))
            .collect()
    }

    /// First stage still to run, `None` once the pipeline is complete.
    pub fn next_stage(&self) -> Option<Stage> {
        self.remaining_stages().first().copied()
    }

    /// `(completed, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.completed_stages.len(), Stage::all().len())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_stages().is_empty()
    }

    /// A workflow is resumable while a non-terminal stage is in progress.
    pub fn is_resumable(&self) -> bool {
        matches!(self.current_stage, Some(s) if s != Stage::terminal())
    }
}

/// Collapse repeats, keeping the first occurrence, so the list stays an ordered set.
fn dedup_stages(stages: &[Stage]) -> Vec<Stage> {
    let mut out: Vec<Stage> = Vec::with_capacity(stages.len());
    for &s in stages {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

fn check_canonical_prefix(stages: &[Stage]) -> Result<()> {
    for (i, (&got, &want)) in stages.iter().zip(Stage::all()).enumerate() {
        if got != want {
            return Err(AutodevError::StageOrder(format!(
                "completed stage #{} is '{got}' but the pipeline expects '{want}'",
                i + 1
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CheckpointTracker
// ---------------------------------------------------------------------------

/// Persists pipeline progress under `.claude/checkpoints/<workflow_id>.json`.
///
/// The tracker does not run stages. By default it records whatever list the
/// caller hands it; with `strict_stage_order` it insists on a canonical prefix.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    security: SecurityContext,
    strict_stage_order: bool,
}

impl CheckpointTracker {
    pub fn new(security: SecurityContext, workflow: &WorkflowConfig) -> Self {
        Self {
            security,
            strict_stage_order: workflow.strict_stage_order,
        }
    }

    fn checkpoint_file(&self, workflow_id: &str) -> Result<PathBuf> {
        self.security
            .validate_agent_name(workflow_id, "checkpoint workflow id")?;
        let path = paths::checkpoint_path(self.security.project_root(), workflow_id);
        self.security.validate_path(&path, "checkpoint file", true)
    }

    /// Write or overwrite the checkpoint for `workflow_id`. Last write wins;
    /// only `created_at` carries over from an earlier record.
    pub fn create_checkpoint(
        &self,
        workflow_id: &str,
        completed_stages: &[Stage],
        current_stage: Option<Stage>,
        artifacts_created: &[String],
    ) -> Result<Checkpoint> {
        let path = self.checkpoint_file(workflow_id)?;
        let completed = dedup_stages(completed_stages);
        if self.strict_stage_order {
            check_canonical_prefix(&completed)?;
        }

        let now = Utc::now();
        let created_at = match self.read(&path, workflow_id) {
            Ok(existing) => existing.created_at,
            Err(_) => now,
        };

        let checkpoint = Checkpoint {
            workflow_id: workflow_id.to_string(),
            completed_stages: completed,
            current_stage,
            artifacts_created: artifacts_created.to_vec(),
            created_at,
            updated_at: now,
        };
        let data = serde_json::to_string_pretty(&checkpoint)?;
        crate::io::atomic_write(&path, data.as_bytes())?;

        tracing::info!(
            workflow_id,
            completed = checkpoint.completed_stages.len(),
            current = ?checkpoint.current_stage,
            "checkpoint saved"
        );
        Ok(checkpoint)
    }

    pub fn load_checkpoint(&self, workflow_id: &str) -> Result<Checkpoint> {
        let path = self.checkpoint_file(workflow_id)?;
        self.read(&path, workflow_id)
    }

    fn read(&self, path: &std::path::Path, workflow_id: &str) -> Result<Checkpoint> {
        if !path.exists() {
            return Err(AutodevError::CheckpointNotFound(workflow_id.to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&data)?;
        Ok(checkpoint)
    }

    /// Workflow ids with an incomplete checkpoint, read lazily from disk.
    /// Order follows the directory listing and is unspecified.
    pub fn list_resumable_workflows(&self) -> impl Iterator<Item = String> + '_ {
        let dir = paths::checkpoints_dir(self.security.project_root());
        std::fs::read_dir(dir)
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some(paths::CHECKPOINT_EXT)
            })
            .filter_map(|path| {
                let data = match std::fs::read_to_string(&path) {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "unreadable checkpoint: {e}");
                        return None;
                    }
                };
                match serde_json::from_str::<Checkpoint>(&data) {
                    Ok(cp) => Some(cp),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "malformed checkpoint: {e}");
                        None
                    }
                }
            })
            .filter(Checkpoint::is_resumable)
            .map(|cp| cp.workflow_id)
    }

    /// Stages still to run for `workflow_id`, in canonical order.
    pub fn get_resume_plan(&self, workflow_id: &str) -> Result<Vec<Stage>> {
        Ok(self.load_checkpoint(workflow_id)?.remaining_stages())
    }

    /// Remove a checkpoint. Nothing in the pipeline calls this; it is for humans.
    pub fn clear_checkpoint(&self, workflow_id: &str) -> Result<()> {
        let path = self.checkpoint_file(workflow_id)?;
        if !path.exists() {
            return Err(AutodevError::CheckpointNotFound(workflow_id.to_string()));
        }
        std::fs::remove_file(&path)?;
        tracing::info!(workflow_id, "checkpoint cleared");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir) -> CheckpointTracker {
        let sec = SecurityContext::new(dir.path(), &Config::default()).unwrap();
        CheckpointTracker::new(sec, &WorkflowConfig::default())
    }

    fn strict_tracker(dir: &TempDir) -> CheckpointTracker {
        let sec = SecurityContext::new(dir.path(), &Config::default()).unwrap();
        CheckpointTracker::new(
            sec,
            &WorkflowConfig {
                strict_stage_order: true,
            },
        )
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint(
            "wf-1",
            &[Stage::Researcher, Stage::Planner],
            Some(Stage::TestMaster),
            &["docs/research.json".to_string()],
        )
        .unwrap();
        t.create_checkpoint("wf-1", &[Stage::Researcher], Some(Stage::Planner), &[])
            .unwrap();

        let cp = t.load_checkpoint("wf-1").unwrap();
        assert_eq!(cp.completed_stages, vec![Stage::Researcher]);
        assert_eq!(cp.current_stage, Some(Stage::Planner));
        assert!(cp.artifacts_created.is_empty());
    }

    #[test]
    fn created_at_survives_overwrite() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let first = t.create_checkpoint("wf-1", &[], Some(Stage::Researcher), &[]).unwrap();
        let second = t
            .create_checkpoint("wf-1", &[Stage::Researcher], Some(Stage::Planner), &[])
            .unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn resume_plan_is_suffix_for_every_prefix() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let all = Stage::all();
        for n in 0..all.len() {
            t.create_checkpoint("wf-prefix", &all[..n], Some(all[n]), &[])
                .unwrap();
            assert_eq!(t.get_resume_plan("wf-prefix").unwrap(), all[n..].to_vec());
        }
    }

    #[test]
    fn resume_plan_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = tracker(&dir).get_resume_plan("nonexistent").unwrap_err();
        assert!(matches!(err, AutodevError::CheckpointNotFound(_)));
    }

    #[test]
    fn full_happy_path() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint("wf-happy", &[], Some(Stage::Researcher), &[])
            .unwrap();

        let mut done = Vec::new();
        for &stage in Stage::all() {
            done.push(stage);
            t.create_checkpoint("wf-happy", &done, stage.next(), &[])
                .unwrap();
        }

        assert!(t.get_resume_plan("wf-happy").unwrap().is_empty());
        let cp = t.load_checkpoint("wf-happy").unwrap();
        assert!(cp.is_complete());
        assert_eq!(cp.next_stage(), None);
        assert_eq!(cp.progress(), (7, 7));
        assert_eq!(t.list_resumable_workflows().count(), 0);
    }

    #[test]
    fn crash_mid_pipeline() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint(
            "wf-crash",
            &[Stage::Researcher, Stage::Planner, Stage::TestMaster],
            Some(Stage::Implementer),
            &[],
        )
        .unwrap();

        assert_eq!(
            t.get_resume_plan("wf-crash").unwrap(),
            vec![
                Stage::Implementer,
                Stage::Reviewer,
                Stage::SecurityAuditor,
                Stage::DocMaster
            ]
        );
        let ids: Vec<String> = t.list_resumable_workflows().collect();
        assert_eq!(ids, vec!["wf-crash".to_string()]);
        assert_eq!(
            t.load_checkpoint("wf-crash").unwrap().next_stage(),
            Some(Stage::Implementer)
        );
    }

    #[test]
    fn list_resumable_skips_terminal_idle_and_garbage() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint("running", &[Stage::Researcher], Some(Stage::Planner), &[])
            .unwrap();
        t.create_checkpoint("idle", &[Stage::Researcher], None, &[])
            .unwrap();
        t.create_checkpoint("finishing", &Stage::all()[..6], Some(Stage::DocMaster), &[])
            .unwrap();
        std::fs::write(
            paths::checkpoints_dir(dir.path()).join("broken.json"),
            "not json",
        )
        .unwrap();
        std::fs::write(paths::checkpoints_dir(dir.path()).join("notes.txt"), "x").unwrap();

        let ids: Vec<String> = t.list_resumable_workflows().collect();
        assert_eq!(ids, vec!["running".to_string()]);
    }

    #[test]
    fn list_resumable_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(tracker(&dir).list_resumable_workflows().count(), 0);
    }

    #[test]
    fn permissive_mode_accepts_skipped_stage_and_dedups() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let cp = t
            .create_checkpoint(
                "wf-skip",
                &[Stage::Researcher, Stage::Implementer, Stage::Researcher],
                None,
                &[],
            )
            .unwrap();
        assert_eq!(
            cp.completed_stages,
            vec![Stage::Researcher, Stage::Implementer]
        );
        assert_eq!(
            t.get_resume_plan("wf-skip").unwrap(),
            vec![
                Stage::Planner,
                Stage::TestMaster,
                Stage::Reviewer,
                Stage::SecurityAuditor,
                Stage::DocMaster
            ]
        );
    }

    #[test]
    fn strict_mode_rejects_skipped_stage() {
        let dir = TempDir::new().unwrap();
        let t = strict_tracker(&dir);
        let err = t
            .create_checkpoint("wf-skip", &[Stage::Researcher, Stage::Implementer], None, &[])
            .unwrap_err();
        assert!(matches!(err, AutodevError::StageOrder(_)));
        assert!(t
            .create_checkpoint("wf-ok", &[Stage::Researcher, Stage::Planner], None, &[])
            .is_ok());
    }

    #[test]
    fn invalid_workflow_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        let err = t
            .create_checkpoint("../escape", &[], None, &[])
            .unwrap_err();
        assert!(matches!(err, AutodevError::Validation { .. }));
    }

    #[test]
    fn file_uses_external_field_names() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint("wf-1", &[Stage::Researcher], Some(Stage::Planner), &[])
            .unwrap();
        let raw = std::fs::read_to_string(paths::checkpoint_path(dir.path(), "wf-1")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["completed_agents"][0], "researcher");
        assert_eq!(value["current_agent"], "planner");
        assert!(value["artifacts_created"].is_array());
    }

    #[test]
    fn clear_removes_checkpoint() {
        let dir = TempDir::new().unwrap();
        let t = tracker(&dir);
        t.create_checkpoint("wf-1", &[], Some(Stage::Researcher), &[])
            .unwrap();
        t.clear_checkpoint("wf-1").unwrap();
        assert!(t.load_checkpoint("wf-1").unwrap_err().is_not_found());
        assert!(t.clear_checkpoint("wf-1").unwrap_err().is_not_found());
    }

    #[test]
    fn generated_ids_are_valid_names() {
        let dir = TempDir::new().unwrap();
        let sec = SecurityContext::new(dir.path(), &Config::default()).unwrap();
        let id = new_workflow_id();
        assert!(sec.validate_agent_name(&id, "test").is_ok());
        assert_ne!(id, new_workflow_id());
    }
}
