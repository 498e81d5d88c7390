use crate::script::{load_script, resolve_script, Step};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Edit script (JSON array of steps)
    pub script: PathBuf,
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let steps = load_script(&resolve_script(cwd, &args.script))?;
    let commits = steps
        .iter()
        .filter(|step| matches!(step, Step::Commit { .. }))
        .count();

    println!(
        "{} {} is valid: {} steps, {} commits",
        "✓".green(),
        args.script.display(),
        steps.len(),
        commits
    );

    Ok(())
}
