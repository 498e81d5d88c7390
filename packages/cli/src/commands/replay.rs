use crate::script::{load_script, resolve_script, Replay};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use outline_editor::EditorConfig;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Edit script (JSON array of steps)
    pub script: PathBuf,

    /// Directory holding outline.config.json (defaults to current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the final document text after the diffs
    #[arg(long)]
    pub show_text: bool,
}

pub fn replay(args: ReplayArgs, cwd: &str) -> Result<()> {
    let config_dir = args.config.unwrap_or_else(|| PathBuf::from(cwd));
    let config = EditorConfig::load(&config_dir)
        .with_context(|| format!("Cannot load config from {}", config_dir.display()))?;
    let steps = load_script(&resolve_script(cwd, &args.script))?;

    tracing::info!(steps = steps.len(), script = %args.script.display(), "Replaying edit script");

    let mut replay = Replay::new(config);
    let mut commits = 0;

    for (index, step) in steps.iter().enumerate() {
        let diffs = replay
            .apply(step)
            .with_context(|| format!("Step {} failed: {:?}", index, step))?;
        for diff in diffs {
            commits += 1;
            println!("{}", serde_json::to_string(&diff)?);
        }
    }

    for diff in replay.finish()? {
        commits += 1;
        println!("{}", serde_json::to_string(&diff)?);
    }

    let editor = replay.editor();
    if args.show_text {
        println!("{}", editor.committed().text_content());
    }

    eprintln!(
        "{} {} steps, {} commits, {} nodes",
        "✓".green(),
        steps.len(),
        commits,
        editor.committed().node_count()
    );

    Ok(())
}
