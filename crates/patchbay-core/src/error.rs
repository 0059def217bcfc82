//! Error types for patchbay-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in patchbay-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path is not a usable working tree.
    #[error("invalid repository at {}: {source}", path.display())]
    InvalidRepository {
        /// The path the workspace was asked to bind to.
        path: PathBuf,
        /// Why the backend rejected it.
        #[source]
        source: patchbay_git::Error,
    },

    /// Config file parsing error.
    #[error("failed to parse {file}: {message}")]
    ConfigParseError { file: PathBuf, message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Versioning backend error.
    #[error("git error: {0}")]
    Git(#[from] patchbay_git::Error),
}

/// Failure of a single change attempt.
///
/// `Mutation` carries the fault the caller's mutation returned, untouched.
/// `Backend` means the workspace's own bookkeeping failed; the workspace
/// state is undefined afterwards and it should be discarded.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError<E> {
    /// The mutation failed; its changes were stashed and reverted.
    #[error(transparent)]
    Mutation(E),

    /// Committing, stashing, or diffing failed.
    #[error("workspace bookkeeping failed: {0}")]
    Backend(#[from] Error),
}

impl<E> AttemptError<E> {
    /// The mutation's own fault, if that is what failed.
    pub fn into_mutation(self) -> Option<E> {
        match self {
            Self::Mutation(fault) => Some(fault),
            Self::Backend(_) => None,
        }
    }

    /// Whether the workspace itself failed.
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

impl<E> From<patchbay_git::Error> for AttemptError<E> {
    fn from(err: patchbay_git::Error) -> Self {
        Self::Backend(Error::Git(err))
    }
}
