//! External collaborators used by actions.
//!
//! Each collaborator is a trait so actions can be tested against mocks;
//! the default adapters drive external programs through an [`Executor`].

pub mod convert;
pub mod decrypt;
pub mod reformat;
pub mod session;

use std::fmt;
use std::sync::Arc;

pub use convert::{EbookConvert, FormatConverter};
pub use decrypt::{DecryptOutcome, DecryptRequest, DedrmTool, Decryptor, KeyCandidate};
pub use reformat::{K2pdfopt, Reformatter};
pub use session::{AccountSession, FetchRequest, Libgourou};

use crate::exec::Executor;
use crate::metadata::{DefaultMetadataReader, MetadataReader};
use crate::operations::{FileSystemOps, SystemFileSystemOps};

/// The collaborator set shared by every transaction of a run.
#[derive(Clone)]
pub struct Services {
    /// Metadata reader.
    pub metadata: Arc<dyn MetadataReader>,
    /// DRM detection and removal.
    pub decryptor: Arc<dyn Decryptor>,
    /// PDF reformatting.
    pub reformatter: Arc<dyn Reformatter>,
    /// KFX to EPUB conversion.
    pub converter: Arc<dyn FormatConverter>,
    /// Adobe account session.
    pub session: Arc<dyn AccountSession>,
    /// Filesystem operations used for staging and commit.
    pub fs: Arc<dyn FileSystemOps>,
}

impl Services {
    /// Default adapters, running external programs through `executor`.
    #[must_use]
    pub fn system(executor: &Arc<dyn Executor>) -> Self {
        Self {
            metadata: Arc::new(DefaultMetadataReader),
            decryptor: Arc::new(DedrmTool::new(Arc::clone(executor))),
            reformatter: Arc::new(K2pdfopt::new(Arc::clone(executor))),
            converter: Arc::new(EbookConvert::new(Arc::clone(executor))),
            session: Arc::new(Libgourou::new(Arc::clone(executor))),
            fs: Arc::new(SystemFileSystemOps),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}
