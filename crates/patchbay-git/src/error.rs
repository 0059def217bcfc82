//! Error types for patchbay-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during versioning operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository.
    #[error("not a git repository")]
    NotARepository,

    /// Repository has no working tree.
    #[error("bare repository has no working tree")]
    BareRepository,

    /// HEAD does not point at a commit yet.
    #[error("repository has no commits - HEAD is unborn")]
    UnbornHead,

    /// Snapshot id does not resolve to a stash commit.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(git2::Oid),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}
