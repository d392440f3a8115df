use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::actions::ActionId;

/// Top-level CLI entry point for the ebooks folder manager.
#[derive(Parser, Debug)]
#[command(
    name = "efm",
    about = "Transactional ebook folder manager: decrypt, rename, reformat and inspect ebooks in place",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

impl Cli {
    /// Console log level after applying `--verbose`.
    #[must_use]
    pub fn console_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG.max(self.global.log_level.into())
        } else {
            self.global.log_level.into()
        }
    }
}

/// Console verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Progress and results
    #[default]
    Info,
    /// Every transaction step
    Debug,
    /// Everything
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Run every action but only log the commit
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Process files one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run actions on files, folders and globs
    Run(RunOpts),
    /// List available actions in execution order
    Actions,
    /// Print version information
    Version,
    /// Generate a shell completion script
    Completions(CompletionsOpts),
}

impl Command {
    /// Subcommand name, used for the log file name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Actions => "actions",
            Self::Version => "version",
            Self::Completions(_) => "completions",
        }
    }
}

/// Options for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunOpts {
    /// Files, folders or glob patterns to process
    #[arg(required = true, value_name = "PATH|GLOB")]
    pub paths: Vec<String>,

    /// Action to run (repeatable); defaults to the config's actions, then print
    #[arg(short, long = "action", value_name = "ID", value_parser = parse_action)]
    pub actions: Vec<ActionId>,

    /// Keep watching the inputs and process files as they appear
    #[arg(long)]
    pub watch: bool,

    /// Keep staging directories after successful transactions
    #[arg(long)]
    pub keep_staging: bool,
}

/// Options for the `completions` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

fn parse_action(value: &str) -> Result<ActionId, String> {
    value
        .parse()
        .map_err(|e| format!("{e} (valid: {})", ActionId::valid_list()))
}
