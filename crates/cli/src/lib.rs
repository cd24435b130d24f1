// Repository plumbing
pub mod git;
pub mod state;

// Adapters over external programs
pub mod ext;
pub mod gpg;
pub(crate) mod subprocess;

// Process lifecycle (logging, panics, build info)
pub mod process;
pub mod version;

pub use git::{GitError, GitRepo, TrackedFile};
pub use state::{EngineKind, RepoConfig, RepoState, StateError};
pub use version::BuildInfo;
