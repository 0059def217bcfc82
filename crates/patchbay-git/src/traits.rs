//! Trait abstraction over the versioning substrate.
//!
//! This module defines the `Backend` trait which the workspace drives,
//! enabling dependency injection and testability.

use std::path::Path;

use git2::Oid;

use crate::Result;

/// Primitive operations a change-tracking workspace needs from its
/// version-control substrate.
///
/// Any substrate that can commit, stash-and-revert, and diff between
/// recorded states satisfies this contract. [`crate::Repository`] is the
/// git implementation.
///
/// Note: all operations are synchronous and act on the working tree in
/// place. A backend is never shared between workspaces.
#[allow(clippy::missing_errors_doc)]
pub trait Backend {
    /// Root of the working tree the backend operates on.
    fn workdir(&self) -> &Path;

    // === Revisions ===

    /// Identifier of the currently committed state (HEAD).
    fn current_revision(&self) -> Result<Oid>;

    /// Unified diff between two committed states.
    fn diff(&self, from: Oid, to: Oid) -> Result<String>;

    // === Working tree ===

    /// Check whether the working tree differs from the last commit,
    /// counting untracked files, and ignored files when snapshots
    /// capture them.
    fn has_changes(&self) -> Result<bool>;

    /// Stage every change in the working tree and return the diff of
    /// the staged state against the last commit.
    fn staged_diff(&self) -> Result<String>;

    /// Commit every change in the working tree on top of HEAD.
    ///
    /// Returns the new revision.
    fn commit(&self, label: &str) -> Result<Oid>;

    /// Move HEAD and the working tree to `revision`, discarding
    /// uncommitted tracked changes.
    fn reset_hard(&self, revision: Oid) -> Result<()>;

    // === Snapshots ===

    /// Move every uncommitted change into side storage and revert the
    /// working tree to the last commit.
    ///
    /// Returns `None` when there was nothing to capture.
    fn snapshot_and_revert(&mut self, label: &str) -> Result<Option<Oid>>;

    /// Unified diff recorded in a snapshot, relative to the commit the
    /// snapshot was taken on.
    fn diff_of_snapshot(&self, snapshot: Oid) -> Result<String>;

    /// Unified diff from the committed state `base` to the content
    /// recorded in a snapshot.
    fn diff_of_snapshot_from(&self, snapshot: Oid, base: Oid) -> Result<String>;
}
