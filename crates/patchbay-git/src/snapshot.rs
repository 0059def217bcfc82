//! Snapshots of rejected changes, stored on the stash stack.

use git2::{ErrorCode, Oid, StashFlags};

use crate::Repository;
use crate::error::Result;

impl Repository {
    /// Stash every uncommitted change and revert the working tree to HEAD.
    ///
    /// New files are staged first so they land in the stash's working
    /// tree and show up in [`Repository::diff_stash`]. When ignored files
    /// are included they go to the stash's untracked commit. Returns
    /// `None` when there is nothing to capture.
    ///
    /// # Errors
    /// Returns error if staging or the stash itself fails.
    pub fn stash_all(&mut self, message: &str) -> Result<Option<Oid>> {
        if !self.has_snapshot_changes()? {
            return Ok(None);
        }

        self.stage_all()?;
        let sig = self.signature()?;

        let mut flags = StashFlags::INCLUDE_UNTRACKED;
        if self.includes_ignored() {
            flags |= StashFlags::INCLUDE_IGNORED;
        }

        match self.inner_mut().stash_save(&sig, message, Some(flags)) {
            Ok(oid) => {
                tracing::debug!(%oid, message, "stashed working tree");
                Ok(Some(oid))
            }
            // Only ignored files changed
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
