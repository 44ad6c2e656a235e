use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the feature-delivery pipeline. Declaration order is the
/// canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Researcher,
    Planner,
    TestMaster,
    Implementer,
    Reviewer,
    SecurityAuditor,
    DocMaster,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Researcher,
            Stage::Planner,
            Stage::TestMaster,
            Stage::Implementer,
            Stage::Reviewer,
            Stage::SecurityAuditor,
            Stage::DocMaster,
        ]
    }

    /// The last stage; a workflow whose current stage is this one is complete.
    pub fn terminal() -> Stage {
        Stage::DocMaster
    }

    /// Stages the orchestrator may dispatch in parallel once implementation is done.
    pub fn validation_group() -> &'static [Stage] {
        &[Stage::Reviewer, Stage::SecurityAuditor, Stage::DocMaster]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::all().get(self.index() + 1).copied()
    }

    pub fn is_validation(self) -> bool {
        Stage::validation_group().contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Researcher => "researcher",
            Stage::Planner => "planner",
            Stage::TestMaster => "test-master",
            Stage::Implementer => "implementer",
            Stage::Reviewer => "reviewer",
            Stage::SecurityAuditor => "security-auditor",
            Stage::DocMaster => "doc-master",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::AutodevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researcher" => Ok(Stage::Researcher),
            "planner" => Ok(Stage::Planner),
            "test-master" => Ok(Stage::TestMaster),
            "implementer" => Ok(Stage::Implementer),
            "reviewer" => Ok(Stage::Reviewer),
            "security-auditor" => Ok(Stage::SecurityAuditor),
            "doc-master" => Ok(Stage::DocMaster),
            _ => Err(crate::error::AutodevError::InvalidStage(s.to_string())),
        }
    }
}

/// Parse a comma-separated stage list such as `researcher,planner`.
/// Empty input yields an empty list.
pub fn parse_stage_list(s: &str) -> crate::error::Result<Vec<Stage>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

// ---------------------------------------------------------------------------
// ArtifactStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    InProgress,
    #[default]
    Completed,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::InProgress => "in_progress",
            ArtifactStatus::Completed => "completed",
            ArtifactStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactStatus {
    type Err = crate::error::AutodevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ArtifactStatus::InProgress),
            "completed" => Ok(ArtifactStatus::Completed),
            "failed" => Ok(ArtifactStatus::Failed),
            _ => Err(crate::error::AutodevError::InvalidArtifactStatus(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_order_is_canonical() {
        let names: Vec<&str> = Stage::all().iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "researcher",
                "planner",
                "test-master",
                "implementer",
                "reviewer",
                "security-auditor",
                "doc-master"
            ]
        );
        assert!(Stage::Planner < Stage::Implementer);
        assert_eq!(Stage::Implementer.next(), Some(Stage::Reviewer));
        assert_eq!(Stage::terminal().next(), None);
    }

    #[test]
    fn stage_roundtrip_through_str_and_serde() {
        for &stage in Stage::all() {
            assert_eq!(Stage::from_str(stage.as_str()).unwrap(), stage);
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }

    #[test]
    fn unknown_stage_rejected() {
        assert!(Stage::from_str("deployer").is_err());
        assert!(Stage::from_str("Test-Master").is_err());
    }

    #[test]
    fn validation_group_is_the_tail() {
        assert!(!Stage::Implementer.is_validation());
        assert!(Stage::Reviewer.is_validation());
        assert!(Stage::DocMaster.is_validation());
    }

    #[test]
    fn parse_stage_list_handles_blanks() {
        assert!(parse_stage_list("").unwrap().is_empty());
        assert_eq!(
            parse_stage_list("researcher, planner").unwrap(),
            vec![Stage::Researcher, Stage::Planner]
        );
        assert!(parse_stage_list("researcher,bogus").is_err());
    }

    #[test]
    fn artifact_status_strings() {
        assert_eq!(
            ArtifactStatus::from_str("in_progress").unwrap(),
            ArtifactStatus::InProgress
        );
        assert!(ArtifactStatus::from_str("done").is_err());
        assert_eq!(ArtifactStatus::default(), ArtifactStatus::Completed);
    }
}
