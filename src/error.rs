//! Error taxonomy for the store and the repository layer.
//!
//! Store errors ([`Error::NotAKeyer`], [`Error::NotFound`],
//! [`Error::StoreClosed`]) propagate to the caller. The rest are recovered
//! where they occur (refresh loop, poll loop) and logged.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A store argument carried no key. Arguments before `index` in the same
    /// call may already have been applied.
    #[error("argument {index} is not a keyer")]
    NotAKeyer { index: usize },

    /// A `get` asked for a key that is not stored.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// The store actor has stopped.
    #[error("store is closed")]
    StoreClosed,

    /// The repository configuration could not be read or parsed.
    #[error("failed to load config {}: {reason}", path.display())]
    ConfigLoad { path: PathBuf, reason: String },

    /// A repository rejected its root during setup.
    #[error("repository setup failed for {root}: {reason}")]
    RepoSetup { root: String, reason: String },

    /// A post file has a malformed header.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
