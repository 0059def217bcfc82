//! # patchbay-git
//!
//! Versioning backend for patchbay, built on git2-rs.
//! Commits accepted changes, stashes rejected ones, and renders
//! patches between any two recorded states of a working tree.

mod diff;
mod error;
mod repository;
mod snapshot;
mod traits;

pub use error::{Error, Result};
pub use git2::Oid;
pub use repository::{Identity, Repository};
pub use traits::Backend;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    use tempfile::TempDir;

    use crate::Repository;

    pub const GEMFILE: &str = "source \"https://rubygems.org\"\n";

    /// Create a repository with one commit containing a `Gemfile`.
    pub fn init_test_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = git2::Repository::init(temp.path()).unwrap();

        // Scoped to drop borrows before reopening
        {
            let mut config = repo
                .config()
                .unwrap()
                .open_level(git2::ConfigLevel::Local)
                .unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();

            fs::write(temp.path().join("Gemfile"), GEMFILE).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("Gemfile")).unwrap();
            index.write().unwrap();

            let sig = repo.signature().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();
        }

        let wrapped = Repository::open(temp.path()).unwrap();
        (temp, wrapped)
    }

    /// Append `text` to `file` under `root`.
    pub fn append(root: &Path, file: &str, text: &str) {
        let mut f = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(root.join(file))
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }
}
