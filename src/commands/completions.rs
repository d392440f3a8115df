//! Command: generate shell completion scripts.

use std::io;

use clap::CommandFactory as _;
use clap_complete::{Shell, generate};

use crate::cli::{Cli, CompletionsOpts};

/// Write the completion script for `shell` to `out`.
pub fn write_completions(shell: Shell, out: &mut dyn io::Write) {
    generate(shell, &mut Cli::command(), "efm", out);
}

/// Print the completion script for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    write_completions(opts.shell, &mut io::stdout());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_mentions_subcommands() {
        let mut buf = Vec::new();
        write_completions(Shell::Bash, &mut buf);
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("efm"));
        assert!(script.contains("completions"));
        assert!(script.contains("--dry-run"));
    }
}
