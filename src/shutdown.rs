//! Process-wide shutdown signal.
//!
//! Ctrl-C sets the flag; the batch driver stops starting new transactions
//! and [`SystemExecutor`](crate::exec::SystemExecutor) kills running
//! children when it observes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};

/// Cloneable handle to a shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a flag that is not wired to any signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag that is set when the process receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler is already installed.
    pub fn install() -> Result<Self> {
        let shutdown = Self::new();
        let handle = shutdown.clone();
        ctrlc::set_handler(move || {
            if handle.is_requested() {
                std::process::exit(130);
            }
            handle.request();
        })
        .context("failed to install Ctrl-C handler")?;
        Ok(shutdown)
    }

    /// Ask all observers to stop.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
