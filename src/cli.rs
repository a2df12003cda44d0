use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "cleantestrepos",
    version,
    about = "Wipe and recreate the scratch directory used by repository tests"
)]
pub struct Cli {
    #[arg(short = 'C', long = "chdir", global = true)]
    pub chdir: Option<PathBuf>,
    /// Explicit config file (defaults to the nearest `testrepos.toml`).
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Directory the workspace lives under.
    #[arg(short = 'r', long = "root", global = true)]
    pub root: Option<PathBuf>,
    /// Write the short `placeholder` text instead of the full sentence.
    #[arg(long = "simple", global = true)]
    pub simple: bool,
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Delete the workspace root and recreate it with a placeholder (default).
    Reset,
    /// Verify the workspace matches a freshly reset tree.
    Check(CheckArgs),
    /// Configuration display, validation, and template generation.
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit the result as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    Path,
    Generate {
        #[arg()]
        path: Option<PathBuf>,
        #[arg(long = "force", default_value_t = false)]
        force: bool,
    },
    Set {
        key: String,
        value: String,
    },
}

/// Helper entry point so `main` can stay minimal.
pub fn parse() -> Cli {
    Cli::parse()
}
