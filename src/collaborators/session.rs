//! Adobe account session collaborator (ACSM license fulfilment).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ActionError;
use crate::exec::Executor;

/// Inputs for one license download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The `.acsm` license document.
    pub acsm: PathBuf,
    /// Adobe account user name.
    pub user: String,
    /// Adobe account password.
    pub password: String,
    /// Account store override (`adept_directory`).
    pub store: Option<PathBuf>,
    /// Directory the book is downloaded into.
    pub output_dir: PathBuf,
}

/// Logs into an Adobe account and downloads the book a license refers to.
#[cfg_attr(test, mockall::automock)]
pub trait AccountSession: Send + Sync {
    /// Activate or select the account, then fulfil the license.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Fetch`] if login or download fails.
    fn download(&self, request: &FetchRequest) -> Result<PathBuf, ActionError>;
}

/// Only one account may be active at a time.
static ACCOUNT_LOCK: Mutex<()> = Mutex::new(());

const ACTIVATE: &str = "adept_activate";
const DOWNLOAD: &str = "acsmdownloader";

/// Uses the libgourou command-line tools, one account store per user.
#[derive(Debug, Clone)]
pub struct Libgourou {
    executor: Arc<dyn Executor>,
}

impl Libgourou {
    /// Create an adapter that runs through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn require(&self, program: &str) -> Result<(), ActionError> {
        if self.executor.which(program) {
            Ok(())
        } else {
            Err(ActionError::Fetch(format!(
                "{program} not found on PATH - install libgourou"
            )))
        }
    }
}

/// Default account store: `$XDG_DATA_HOME/efm/adept/<user>`.
fn default_store(user: &str) -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".local")
                .join("share")
        },
        PathBuf::from,
    );
    let safe_user: String = user
        .chars()
        .map(|c| if c.is_alphanumeric() || "@.-_".contains(c) { c } else { '_' })
        .collect();
    data_dir.join("efm").join("adept").join(safe_user)
}

/// Newest `.epub`/`.pdf` in `dir`.
fn downloaded_book(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|e| e.eq_ignore_ascii_case("epub") || e.eq_ignore_ascii_case("pdf"))
        })
        .max_by_key(|p| p.metadata().and_then(|m| m.modified()).ok())
}

impl AccountSession for Libgourou {
    fn download(&self, request: &FetchRequest) -> Result<PathBuf, ActionError> {
        self.require(ACTIVATE)?;
        self.require(DOWNLOAD)?;
        let store = request
            .store
            .clone()
            .unwrap_or_else(|| default_store(&request.user));

        let _guard = ACCOUNT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if !store.join("activation.xml").exists() {
            std::fs::create_dir_all(&store)
                .map_err(|e| ActionError::io(format!("creating {}", store.display()), e))?;
            tracing::debug!("activating Adobe account {} in {}", request.user, store.display());
            self.executor
                .run(
                    ACTIVATE,
                    &[
                        OsStr::new("-u"),
                        OsStr::new(&request.user),
                        OsStr::new("-p"),
                        OsStr::new(&request.password),
                        OsStr::new("-O"),
                        store.as_os_str(),
                    ],
                )
                .map_err(|e| ActionError::Fetch(format!("login failed - {e:#}")))?;
        }

        self.executor
            .run(
                DOWNLOAD,
                &[
                    OsStr::new("-D"),
                    store.as_os_str(),
                    OsStr::new("-O"),
                    request.output_dir.as_os_str(),
                    OsStr::new("-f"),
                    request.acsm.as_os_str(),
                ],
            )
            .map_err(|e| ActionError::Fetch(format!("{e:#}")))?;

        downloaded_book(&request.output_dir).ok_or_else(|| {
            ActionError::Fetch(format!(
                "{DOWNLOAD} did not produce a book for {}",
                request.acsm.display()
            ))
        })
    }
}
