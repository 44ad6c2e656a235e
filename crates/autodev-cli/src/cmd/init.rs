use anyhow::Context;
use autodev_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing autodev in: {}", root.display());

    let dirs = [
        paths::CLAUDE_DIR,
        paths::CHECKPOINTS_DIR,
        paths::ARTIFACTS_DIR,
        paths::LOGS_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .with_context(|| format!("failed to write {}", paths::CONFIG_FILE))?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        // Surface a broken file now rather than on the first real command.
        Config::load(root).with_context(|| format!("{} is invalid", paths::CONFIG_FILE))?;
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    // Audit logs are local operational data, not project history.
    io::ensure_gitignore_entry(root, &format!("{}/", paths::LOGS_DIR))
        .context("failed to update .gitignore")?;

    println!("\nDone. Auto-commit is off until git.auto_commit is set in {}.", paths::CONFIG_FILE);
    Ok(())
}
