use super::Env;
use crate::output::{print_json, print_table};
use anyhow::Context;
use autodev_core::audit::AuditStatus;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum AuditSubcommand {
    /// Show the most recent audit records
    Tail {
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
}

pub fn run(root: &Path, subcmd: AuditSubcommand, json: bool) -> anyhow::Result<()> {
    let AuditSubcommand::Tail { limit } = subcmd;
    let env = Env::load(root)?;
    let records = env
        .security
        .audit()
        .tail(limit)
        .context("failed to read audit log")?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.event_type.clone(),
                match r.status {
                    AuditStatus::Success => "ok".to_string(),
                    AuditStatus::Failure => "FAIL".to_string(),
                },
                r.context
                    .get("purpose")
                    .and_then(|p| p.as_str())
                    .unwrap_or("")
                    .to_string(),
            ]
        })
        .collect();
    print_table(&["TIME", "EVENT", "STATUS", "PURPOSE"], rows);
    Ok(())
}
