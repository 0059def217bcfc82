//! Repository wrapper providing the versioning primitives.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, IndexAddOption, Oid, ResetType, Signature, StatusOptions};

use crate::error::{Error, Result};
use crate::traits::Backend;

/// Author identity used when the repository has no `user.name`/`user.email`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Author and committer name.
    pub name: String,
    /// Author and committer email.
    pub email: String,
}

/// High-level wrapper around a git working tree.
pub struct Repository {
    inner: git2::Repository,
    workdir: PathBuf,
    fallback_identity: Option<Identity>,
    include_ignored: bool,
}

impl Repository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    /// Returns `NotARepository` if no repository is found at path or any
    /// parent, `BareRepository` if it has no working tree.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => Error::NotARepository,
            _ => Error::Git2(e),
        })?;
        let workdir = inner.workdir().ok_or(Error::BareRepository)?.to_path_buf();

        Ok(Self {
            inner,
            workdir,
            fallback_identity: None,
            include_ignored: false,
        })
    }

    /// Use `identity` for commits and snapshots when git config has none.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.fallback_identity = Some(identity);
        self
    }

    /// Also capture (and remove) ignored files when taking snapshots.
    #[must_use]
    pub const fn with_ignored_files(mut self, include: bool) -> Self {
        self.include_ignored = include;
        self
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// Whether snapshots include ignored files.
    #[must_use]
    pub const fn includes_ignored(&self) -> bool {
        self.include_ignored
    }

    // === Commit operations ===

    /// Get the commit HEAD points at.
    ///
    /// # Errors
    /// Returns `UnbornHead` if the repository has no commits yet.
    pub fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self.inner.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => Error::UnbornHead,
            _ => Error::Git2(e),
        })?;
        Ok(head.peel_to_commit()?)
    }

    /// Get the signature for commits and snapshots.
    ///
    /// # Errors
    /// Returns error if git config has no identity and no fallback is set.
    pub fn signature(&self) -> Result<Signature<'static>> {
        match self.inner.signature() {
            Ok(sig) => Ok(sig),
            Err(err) => match &self.fallback_identity {
                Some(identity) => Ok(Signature::now(&identity.name, &identity.email)?),
                None => Err(err.into()),
            },
        }
    }

    /// Stage every working tree change, including new and deleted files.
    pub(crate) fn stage_all(&self) -> Result<git2::Index> {
        let mut index = self.inner.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(index)
    }

    /// Commit every change in the working tree on top of HEAD.
    ///
    /// # Errors
    /// Returns error if staging or commit creation fails.
    pub fn commit_all(&self, message: &str) -> Result<Oid> {
        let mut index = self.stage_all()?;
        let tree = self.inner.find_tree(index.write_tree()?)?;
        let parent = self.head_commit()?;
        let sig = self.signature()?;

        let oid = self
            .inner
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
        tracing::debug!(%oid, parent = %parent.id(), "committed working tree");
        Ok(oid)
    }

    // === Working directory state ===

    /// Check if the working directory is clean.
    ///
    /// Untracked files count as changes; ignored files do not.
    ///
    /// # Errors
    /// Returns error if status check fails.
    pub fn is_clean(&self) -> Result<bool> {
        self.status_is_empty(false)
    }

    /// Check for changes a snapshot would capture.
    ///
    /// Same as [`Repository::is_clean`], except ignored files count when
    /// snapshots include them.
    ///
    /// # Errors
    /// Returns error if status check fails.
    pub fn has_snapshot_changes(&self) -> Result<bool> {
        Ok(!self.status_is_empty(self.include_ignored)?)
    }

    fn status_is_empty(&self, include_ignored: bool) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(include_ignored);
        let statuses = self.inner.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    // === Reset operations ===

    /// Hard reset HEAD and the working tree to a specific commit.
    ///
    /// # Errors
    /// Returns error if the commit doesn't exist or reset fails.
    pub fn reset_to(&self, target: Oid) -> Result<()> {
        let commit = self.inner.find_commit(target)?;
        self.inner
            .reset(commit.as_object(), ResetType::Hard, None)?;
        tracing::debug!(%target, "reset working tree");
        Ok(())
    }

    // === Low-level access ===

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer high-level methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }

    pub(crate) const fn inner_mut(&mut self) -> &mut git2::Repository {
        &mut self.inner
    }
}

impl Backend for Repository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn current_revision(&self) -> Result<Oid> {
        Ok(self.head_commit()?.id())
    }

    fn diff(&self, from: Oid, to: Oid) -> Result<String> {
        self.diff_revisions(from, to)
    }

    fn has_changes(&self) -> Result<bool> {
        self.has_snapshot_changes()
    }

    fn staged_diff(&self) -> Result<String> {
        self.diff_staged()
    }

    fn commit(&self, label: &str) -> Result<Oid> {
        self.commit_all(label)
    }

    fn reset_hard(&self, revision: Oid) -> Result<()> {
        self.reset_to(revision)
    }

    fn snapshot_and_revert(&mut self, label: &str) -> Result<Option<Oid>> {
        self.stash_all(label)
    }

    fn diff_of_snapshot(&self, snapshot: Oid) -> Result<String> {
        self.diff_stash(snapshot)
    }

    fn diff_of_snapshot_from(&self, snapshot: Oid, base: Oid) -> Result<String> {
        self.diff_stash_from(snapshot, Some(base))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .field("include_ignored", &self.include_ignored)
            .finish_non_exhaustive()
    }
}
