use crate::error::{AutodevError, Result};
use crate::paths;
use crate::security::SecurityContext;
use crate::types::{ArtifactStatus, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ARTIFACT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub version: String,
    #[serde(rename = "agent")]
    pub stage: Stage,
    pub workflow_id: String,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Artifact {
    pub fn new(
        workflow_id: impl Into<String>,
        stage: Stage,
        status: ArtifactStatus,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION.to_string(),
            stage,
            workflow_id: workflow_id.into(),
            status,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// Reads and writes `.claude/artifacts/<workflow_id>/<stage>.json`.
/// One file per (workflow, stage); a second write replaces the first.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    security: SecurityContext,
}

impl ArtifactManager {
    pub fn new(security: SecurityContext) -> Self {
        Self { security }
    }

    pub fn artifact_file(&self, workflow_id: &str, stage: Stage) -> Result<PathBuf> {
        self.security
            .validate_agent_name(workflow_id, "artifact workflow id")?;
        let path = paths::artifact_path(self.security.project_root(), workflow_id, stage);
        self.security.validate_path(&path, "artifact file", true)
    }

    pub fn write_artifact(
        &self,
        workflow_id: &str,
        stage: Stage,
        status: ArtifactStatus,
        payload: serde_json::Value,
    ) -> Result<(Artifact, PathBuf)> {
        let path = self.artifact_file(workflow_id, stage)?;
        let artifact = Artifact::new(workflow_id, stage, status, payload);
        let data = serde_json::to_string_pretty(&artifact)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        tracing::info!(workflow_id, stage = %stage, status = %status, "artifact written");
        Ok((artifact, path))
    }

    pub fn read_artifact(&self, workflow_id: &str, stage: Stage) -> Result<Artifact> {
        let path = self.artifact_file(workflow_id, stage)?;
        if !path.exists() {
            return Err(AutodevError::ArtifactNotFound {
                workflow_id: workflow_id.to_string(),
                stage: stage.to_string(),
            });
        }
        let data = std::fs::read_to_string(&path)?;
        let artifact: Artifact = serde_json::from_str(&data)?;
        Ok(artifact)
    }

    /// Every artifact present for `workflow_id`, in canonical stage order.
    pub fn list_artifacts(&self, workflow_id: &str) -> Result<Vec<Artifact>> {
        let mut out = Vec::new();
        for &stage in Stage::all() {
            match self.read_artifact(workflow_id, stage) {
                Ok(a) => out.push(a),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ArtifactManager {
        ArtifactManager::new(SecurityContext::new(dir.path(), &Config::default()).unwrap())
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir);
        let (_, path) = m
            .write_artifact(
                "wf-1",
                Stage::Researcher,
                ArtifactStatus::Completed,
                json!({"findings": ["use argon2"]}),
            )
            .unwrap();
        assert!(path.ends_with(".claude/artifacts/wf-1/researcher.json"));

        let a = m.read_artifact("wf-1", Stage::Researcher).unwrap();
        assert_eq!(a.version, ARTIFACT_VERSION);
        assert_eq!(a.payload["findings"][0], "use argon2");
    }

    #[test]
    fn second_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir);
        m.write_artifact("wf-1", Stage::Planner, ArtifactStatus::InProgress, json!({"v": 1}))
            .unwrap();
        m.write_artifact("wf-1", Stage::Planner, ArtifactStatus::Completed, json!({"v": 2}))
            .unwrap();
        let a = m.read_artifact("wf-1", Stage::Planner).unwrap();
        assert_eq!(a.status, ArtifactStatus::Completed);
        assert_eq!(a.payload["v"], 2);
        let files = std::fs::read_dir(paths::workflow_artifacts_dir(dir.path(), "wf-1"))
            .unwrap()
            .count();
        assert_eq!(files, 1);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = manager(&dir)
            .read_artifact("wf-1", Stage::Reviewer)
            .unwrap_err();
        assert!(matches!(err, AutodevError::ArtifactNotFound { .. }));
    }

    #[test]
    fn list_is_in_canonical_order() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir);
        m.write_artifact("wf-1", Stage::Implementer, ArtifactStatus::Completed, json!({}))
            .unwrap();
        m.write_artifact("wf-1", Stage::Researcher, ArtifactStatus::Completed, json!({}))
            .unwrap();
        let stages: Vec<Stage> = m
            .list_artifacts("wf-1")
            .unwrap()
            .into_iter()
            .map(|a| a.stage)
            .collect();
        assert_eq!(stages, vec![Stage::Researcher, Stage::Implementer]);
    }

    #[test]
    fn file_carries_required_fields() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir);
        let (_, path) = m
            .write_artifact("wf-1", Stage::DocMaster, ArtifactStatus::Failed, json!(null))
            .unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        assert_eq!(raw["agent"], "doc-master");
        assert_eq!(raw["workflow_id"], "wf-1");
        assert_eq!(raw["status"], "failed");
    }

    #[test]
    fn bad_workflow_id_rejected() {
        let dir = TempDir::new().unwrap();
        let err = manager(&dir)
            .write_artifact("wf 1", Stage::Planner, ArtifactStatus::Completed, json!({}))
            .unwrap_err();
        assert!(matches!(err, AutodevError::Validation { .. }));
    }
}
