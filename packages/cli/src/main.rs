mod commands;
mod script;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, replay, CheckArgs, ReplayArgs};
use tracing_subscriber::EnvFilter;

/// Outline CLI - replay edit scripts through the editor core
#[derive(Parser, Debug)]
#[command(name = "outline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log editor internals (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a script and print each commit's diff as a JSON line
    Replay(ReplayArgs),

    /// Validate a script without running it
    Check(CheckArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()
        .expect("Cannot get current directory")
        .display()
        .to_string();

    let result = match cli.command {
        Command::Replay(args) => replay(args, &cwd),
        Command::Check(args) => check(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
