//! Patch rendering between trees, the index, and snapshots.

use git2::{Diff, DiffFormat, Oid};

use crate::Repository;
use crate::error::{Error, Result};

impl Repository {
    /// Render the diff between two commits as a unified patch.
    ///
    /// # Errors
    /// Returns error if either commit cannot be found.
    pub fn diff_revisions(&self, from: Oid, to: Oid) -> Result<String> {
        if from == to {
            return Ok(String::new());
        }

        let old_tree = self.inner().find_commit(from)?.tree()?;
        let new_tree = self.inner().find_commit(to)?.tree()?;
        let diff = self
            .inner()
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;
        render_patch(&diff)
    }

    /// Stage every working tree change and render the staged diff
    /// against HEAD.
    ///
    /// Equivalent to `git add --all && git diff --cached`.
    ///
    /// # Errors
    /// Returns error if staging or diffing fails.
    pub fn diff_staged(&self) -> Result<String> {
        let index = self.stage_all()?;
        let head_tree = self.head_commit()?.tree()?;
        let diff = self
            .inner()
            .diff_tree_to_index(Some(&head_tree), Some(&index), None)?;
        render_patch(&diff)
    }

    /// Render the changes recorded in a stash commit.
    ///
    /// The diff runs from the commit the stash was taken on (its first
    /// parent) to the stashed working tree.
    ///
    /// # Errors
    /// Returns `SnapshotNotFound` if `snapshot` is not a stash commit.
    pub fn diff_stash(&self, snapshot: Oid) -> Result<String> {
        self.diff_stash_from(snapshot, None)
    }

    /// Render the changes recorded in a stash commit relative to `base`,
    /// or to the commit the stash was taken on when `base` is `None`.
    ///
    /// Files in the stash's untracked commit (untracked or ignored files
    /// captured by the stash) are appended as new files.
    ///
    /// # Errors
    /// Returns `SnapshotNotFound` if `snapshot` is not a stash commit.
    pub fn diff_stash_from(&self, snapshot: Oid, base: Option<Oid>) -> Result<String> {
        let commit = self
            .inner()
            .find_commit(snapshot)
            .map_err(|_| Error::SnapshotNotFound(snapshot))?;

        // Stash commits are merges of HEAD and the index commit
        if commit.parent_count() < 2 {
            return Err(Error::SnapshotNotFound(snapshot));
        }

        let base_tree = match base {
            Some(oid) => self.inner().find_commit(oid)?.tree()?,
            None => commit.parent(0)?.tree()?,
        };
        let diff = self
            .inner()
            .diff_tree_to_tree(Some(&base_tree), Some(&commit.tree()?), None)?;
        let mut patch = render_patch(&diff)?;

        if commit.parent_count() > 2 {
            let untracked_tree = commit.parent(2)?.tree()?;
            let untracked = self
                .inner()
                .diff_tree_to_tree(None, Some(&untracked_tree), None)?;
            patch.push_str(&render_patch(&untracked)?);
        }

        Ok(patch)
    }
}

/// Render a git2 diff in `git diff` patch format.
fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut patch = Vec::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        // Content lines carry their origin marker separately
        let origin = line.origin();
        if matches!(origin, '+' | '-' | ' ') {
            let mut buf = [0; 4];
            patch.extend_from_slice(origin.encode_utf8(&mut buf).as_bytes());
        }
        patch.extend_from_slice(line.content());
        true
    })?;

    Ok(String::from_utf8_lossy(&patch).into_owned())
}
