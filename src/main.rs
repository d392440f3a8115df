use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use efm_cli::cli::{Cli, Command};
use efm_cli::commands;
use efm_cli::logging::{Logger, init_subscriber};
use efm_cli::shutdown::Shutdown;

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let command = args.command.name();
    init_subscriber(args.console_level(), command);
    let log = Arc::new(Logger::new(command));

    match &args.command {
        Command::Run(opts) => {
            let shutdown = Shutdown::install()?;
            commands::run::run(&args.global, opts, &log, &shutdown)
        }
        Command::Actions => {
            commands::actions::run(&log);
            Ok(())
        }
        Command::Version => {
            commands::version::run(&log);
            Ok(())
        }
        Command::Completions(opts) => {
            commands::completions::run(opts);
            Ok(())
        }
    }
}
