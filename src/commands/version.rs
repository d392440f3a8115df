//! Command: print version information.

use crate::logging::Logger;

/// Version string: `EFM_VERSION` from the build when set, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("EFM_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the efm version to stdout.
pub fn run(log: &Logger) {
    log.print(&format!("efm {}", version()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
