use super::Env;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ValidateSubcommand {
    /// Check a path stays inside the allowed roots; prints the canonical path
    Path {
        path: PathBuf,
        #[arg(long, default_value = "cli")]
        purpose: String,
        /// Accept paths that do not exist yet
        #[arg(long)]
        allow_missing: bool,
    },
    /// Check an agent or workflow name
    Agent {
        name: String,
        #[arg(long, default_value = "cli")]
        purpose: String,
    },
    /// Check a GitHub issue number
    Issue {
        #[arg(allow_hyphen_values = true)]
        number: i64,
        #[arg(long, default_value = "cli")]
        purpose: String,
    },
    /// Check free text for length and control characters
    Input {
        text: String,
        /// Defaults to security.max_input_length
        #[arg(long)]
        max_length: Option<usize>,
        #[arg(long, default_value = "input")]
        field: String,
        #[arg(long, default_value = "cli")]
        purpose: String,
    },
}

pub fn run(root: &Path, subcmd: ValidateSubcommand, json: bool) -> anyhow::Result<()> {
    let env = Env::load(root)?;
    let sec = &env.security;

    let (kind, value) = match subcmd {
        ValidateSubcommand::Path {
            path,
            purpose,
            allow_missing,
        } => {
            let resolved = sec
                .validate_path(&path, &purpose, allow_missing)
                .context("path rejected")?;
            ("path", resolved.display().to_string())
        }
        ValidateSubcommand::Agent { name, purpose } => {
            sec.validate_agent_name(&name, &purpose)
                .context("name rejected")?;
            ("agent", name)
        }
        ValidateSubcommand::Issue { number, purpose } => {
            let n = sec
                .validate_github_issue(number, &purpose)
                .context("issue number rejected")?;
            ("issue", n.to_string())
        }
        ValidateSubcommand::Input {
            text,
            max_length,
            field,
            purpose,
        } => {
            let max = max_length.unwrap_or_else(|| sec.max_input_length());
            sec.validate_input_length(&text, max, &field, &purpose)
                .with_context(|| format!("{field} rejected"))?;
            ("input", text)
        }
    };

    if json {
        print_json(&serde_json::json!({ "kind": kind, "valid": true, "value": value }))?;
    } else {
        println!("{value}");
    }
    Ok(())
}
