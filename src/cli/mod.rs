//! CLI argument parsing and command handlers.

pub mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Run step scripts against LLM providers.
#[derive(Parser, Debug)]
#[command(name = "stepwise", version, about = "Run step scripts against LLM providers")]
pub struct Cli {
    /// Config file (defaults to ./stepwise.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Do not print progress ticks while waiting on a provider
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Fail instead of prompting for input
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute step scripts
    Run(RunArgs),
    /// List step scripts
    List(ListArgs),
    /// Show the model catalog
    Models,
    /// Prompt for and store a provider API key
    Key(KeyArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script paths, or name prefixes looked up in the steps directory
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Skip writing transcripts
    #[arg(long)]
    pub no_transcript: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Name prefix to filter by
    pub pattern: Option<String>,

    /// Print parsed statements instead of descriptions
    #[arg(long)]
    pub statements: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Provider name (e.g. openai, anthropic)
    pub provider: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_run_with_several_patterns() {
        let cli = Cli::try_parse_from(["stepwise", "run", "intro", "steps/x.step"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.patterns, vec!["intro", "steps/x.step"]);
                assert!(!args.no_transcript);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn parse_run_without_patterns_is_error() {
        assert!(Cli::try_parse_from(["stepwise", "run"]).is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "stepwise",
            "run",
            "intro",
            "-vv",
            "--no-progress",
            "--non-interactive",
            "--config",
            "alt.toml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_progress);
        assert!(cli.non_interactive);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn parse_list_defaults() {
        let cli = Cli::try_parse_from(["stepwise", "list"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                assert!(args.pattern.is_none());
                assert!(!args.statements);
            }
            other => panic!("expected List, got {other:?}"),
        }
    }

    #[test]
    fn parse_key_requires_provider() {
        assert!(Cli::try_parse_from(["stepwise", "key"]).is_err());
        let cli = Cli::try_parse_from(["stepwise", "key", "anthropic"]).unwrap();
        assert!(matches!(cli.command, Commands::Key(ref k) if k.provider == "anthropic"));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["stepwise"]).is_err());
    }
}
