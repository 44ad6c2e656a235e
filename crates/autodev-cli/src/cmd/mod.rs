pub mod artifact;
pub mod audit;
pub mod checkpoint;
pub mod config;
pub mod git;
pub mod init;
pub mod status;
pub mod validate;

use anyhow::Context;
use autodev_core::{
    artifact::ArtifactManager, checkpoint::CheckpointTracker, config::Config,
    security::SecurityContext,
};
use std::path::Path;

/// Config plus the security context every command validates through.
pub struct Env {
    pub config: Config,
    pub security: SecurityContext,
}

impl Env {
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load_or_default(root).context("failed to load config")?;
        let security = SecurityContext::new(root, &config)
            .with_context(|| format!("project root '{}' is not accessible", root.display()))?;
        Ok(Self { config, security })
    }

    pub fn tracker(&self) -> CheckpointTracker {
        CheckpointTracker::new(self.security.clone(), &self.config.workflow)
    }

    pub fn artifacts(&self) -> ArtifactManager {
        ArtifactManager::new(self.security.clone())
    }
}
