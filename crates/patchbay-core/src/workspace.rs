//! The change-tracking workspace.
//!
//! A [`Workspace`] runs mutations against a working tree one at a time.
//! Each mutation that succeeds is committed; each one that fails is
//! stashed and reverted so the working tree only ever reflects accepted
//! changes. [`Workspace::to_patch`] reports everything accepted since
//! the workspace was opened.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use patchbay_git::{Backend, Oid, Repository};

use crate::attempt::{ChangeAttempt, Fault};
use crate::config::Config;
use crate::error::{AttemptError, Error, Result};

/// Transactional workspace over a single working tree.
///
/// Single writer: nothing here is synchronized, and two workspaces on
/// the same checkout will corrupt each other's bookkeeping.
#[derive(Debug)]
pub struct Workspace<B = Repository> {
    backend: B,
    config: Config,
    path: PathBuf,
    initial_revision: Oid,
    attempts: Vec<ChangeAttempt>,
}

impl Workspace<Repository> {
    /// Open a workspace on the git working tree containing `path`,
    /// with config loaded from the repository's default location.
    ///
    /// # Errors
    /// Returns `InvalidRepository` if `path` is not inside a working tree
    /// with at least one commit, or an error if the config can't be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = open_repository(path)?;
        let config = Config::load(Config::default_path(repo.git_dir()))?;
        Self::from_repository(path, repo, config)
    }

    /// Open a workspace with an explicit config.
    ///
    /// # Errors
    /// Returns `InvalidRepository` if `path` is not inside a working tree
    /// with at least one commit.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let repo = open_repository(path)?;
        Self::from_repository(path, repo, config)
    }

    fn from_repository(path: &Path, repo: Repository, config: Config) -> Result<Self> {
        let repo = repo
            .with_identity(config.identity())
            .with_ignored_files(config.snapshot.include_ignored);

        Self::new(repo, config).map_err(|e| match e {
            Error::Git(source) => Error::InvalidRepository {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }
}

fn open_repository(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|source| Error::InvalidRepository {
        path: path.to_path_buf(),
        source,
    })
}

impl<B: Backend> Workspace<B> {
    /// Bind a workspace to an already-open backend.
    ///
    /// # Errors
    /// Returns error if the backend cannot report its current revision.
    pub fn new(backend: B, config: Config) -> Result<Self> {
        let initial_revision = backend.current_revision()?;
        let path = backend.workdir().to_path_buf();
        tracing::debug!(path = %path.display(), %initial_revision, "opened workspace");

        Ok(Self {
            backend,
            config,
            path,
            initial_revision,
            attempts: Vec::new(),
        })
    }

    /// Root of the working tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Revision HEAD pointed at when the workspace was opened.
    #[must_use]
    pub const fn initial_revision(&self) -> Oid {
        self.initial_revision
    }

    /// Settings used for commit and snapshot labels.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run `mutation` against the working tree and record the outcome.
    ///
    /// The mutation receives the working tree root. If it returns `Ok`,
    /// its changes are committed (when there are any). If it returns
    /// `Err`, its changes are stashed, the working tree is reverted, and
    /// the error is handed back unchanged as [`AttemptError::Mutation`].
    /// A panic is recorded and reverted the same way, then resumed.
    ///
    /// Commits the mutation makes on its own belong to the attempt: they
    /// are kept on success and rewound on failure.
    ///
    /// # Errors
    /// Returns `Mutation` with the mutation's own error, or `Backend` if
    /// committing or stashing failed. After a `Backend` error the working
    /// tree is in an unknown state.
    pub fn attempt_change<T, E, F>(
        &mut self,
        memo: Option<&str>,
        mutation: F,
    ) -> std::result::Result<T, AttemptError<E>>
    where
        F: FnOnce(&Path) -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        let span = tracing::info_span!(
            "attempt_change",
            attempt = self.attempts.len() + 1,
            memo = memo.unwrap_or_default(),
        );
        let _guard = span.enter();

        let pre = self.backend.current_revision()?;
        let path = self.path.as_path();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| mutation(path)));

        match outcome {
            Ok(Ok(value)) => {
                self.record_success(memo, pre)?;
                Ok(value)
            }
            Ok(Err(fault)) => {
                let captured = Fault::from_error(&fault);
                tracing::info!(%captured, "mutation failed");
                self.record_failure(memo, captured, pre)?;
                Err(AttemptError::Mutation(fault))
            }
            Err(payload) => {
                let captured = Fault::from_panic(&*payload);
                tracing::warn!(%captured, "mutation panicked");
                if let Err(err) = self.record_failure(memo, captured, pre) {
                    // The panic still wins; the tree is left as the mutation did
                    tracing::error!(%err, "failed to revert panicked attempt");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    fn record_success(&mut self, memo: Option<&str>, pre: Oid) -> Result<()> {
        let id = if self.backend.staged_diff()?.is_empty() {
            self.backend.current_revision()?
        } else {
            let label = memo.unwrap_or(self.config.commit.message.as_str());
            self.backend.commit(label)?
        };
        let diff = self.backend.diff(pre, id)?;

        tracing::info!(%id, changed = !diff.is_empty(), "accepted change");
        self.attempts.push(ChangeAttempt::succeeded(id, diff, memo));
        Ok(())
    }

    fn record_failure(&mut self, memo: Option<&str>, fault: Fault, pre: Oid) -> Result<()> {
        let label = memo.unwrap_or(self.config.commit.snapshot_message.as_str());
        let snapshot = self.backend.snapshot_and_revert(label)?;

        // The mutation may have committed on its own
        let post = self.backend.current_revision()?;
        if post != pre {
            tracing::info!(%pre, %post, "rewinding commits made by failed mutation");
            self.backend.reset_hard(pre)?;
        }

        let (id, diff) = match snapshot {
            Some(snapshot) if post == pre => (snapshot, self.backend.diff_of_snapshot(snapshot)?),
            Some(snapshot) => (
                snapshot,
                self.backend.diff_of_snapshot_from(snapshot, pre)?,
            ),
            None => (post, self.backend.diff(pre, post)?),
        };

        tracing::info!(%id, "stashed failed change");
        self.attempts.push(ChangeAttempt::failed(id, diff, memo, fault));
        Ok(())
    }

    /// Diffs of the successful attempts, in order.
    #[must_use]
    pub fn changes(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.is_success())
            .map(ChangeAttempt::diff)
            .collect()
    }

    /// Every attempt, in execution order.
    #[must_use]
    pub fn change_attempts(&self) -> &[ChangeAttempt] {
        &self.attempts
    }

    /// Attempts whose mutation failed, in execution order.
    #[must_use]
    pub fn failed_change_attempts(&self) -> Vec<&ChangeAttempt> {
        self.attempts.iter().filter(|a| a.is_error()).collect()
    }

    /// Whether any successful attempt changed the working tree.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changes().iter().any(|diff| !diff.is_empty())
    }

    /// Single patch from the initial revision to the current commit.
    ///
    /// # Errors
    /// Returns error if the backend cannot diff the two revisions.
    pub fn to_patch(&self) -> Result<String> {
        let head = self.backend.current_revision()?;
        Ok(self.backend.diff(self.initial_revision, head)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;
    use std::io;

    use tempfile::TempDir;

    use super::*;
    use crate::test_support::{GEMFILE, append, commit_in, head, init_test_repo};

    fn gemfile(ws: &Workspace) -> String {
        fs::read_to_string(ws.path().join("Gemfile")).unwrap()
    }

    fn resolver_failure() -> io::Error {
        io::Error::other("could not resolve dependency graph")
    }

    #[test]
    fn test_open_rejects_non_repository() {
        let temp = TempDir::new().unwrap();
        let err = Workspace::open(temp.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidRepository { .. }));
    }

    #[test]
    fn test_open_rejects_repository_without_commits() {
        let temp = TempDir::new().unwrap();
        git2::Repository::init(temp.path()).unwrap();

        let err = Workspace::open(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRepository {
                source: patchbay_git::Error::UnbornHead,
                ..
            }
        ));
    }

    #[test]
    fn test_fresh_workspace_is_empty() {
        let temp = init_test_repo();
        let ws = Workspace::open(temp.path()).unwrap();

        assert_eq!(ws.initial_revision(), head(temp.path()));
        assert!(ws.changes().is_empty());
        assert!(ws.change_attempts().is_empty());
        assert!(!ws.is_changed());
        assert_eq!(ws.to_patch().unwrap(), "");
    }

    #[test]
    fn test_successful_attempts_share_one_hunk() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();
        let initial = ws.initial_revision();

        ws.attempt_change(Some("add rails"), |root| {
            append(root, "Gemfile", "gem \"rails\"\n")
        })
        .unwrap();
        ws.attempt_change(Some("add rack"), |root| {
            append(root, "Gemfile", "gem \"rack\"\n")
        })
        .unwrap();

        assert_eq!(ws.changes().len(), 2);
        assert_eq!(ws.initial_revision(), initial);
        assert_ne!(head(temp.path()), initial);

        let patch = ws.to_patch().unwrap();
        assert_eq!(patch.matches("@@ ").count(), 1);
        assert!(patch.contains("+gem \"rails\"\n+gem \"rack\"\n"));

        let second = &ws.change_attempts()[1];
        assert!(second.diff().contains("+gem \"rack\"\n"));
        assert!(!second.diff().contains("+gem \"rails\"\n"));
        assert_eq!(second.id(), head(temp.path()));
    }

    #[test]
    fn test_failed_attempt_is_reverted_and_recorded() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        ws.attempt_change(Some("add A"), |root| append(root, "Gemfile", "A\n"))
            .unwrap();
        ws.attempt_change(Some("add B"), |root| append(root, "Gemfile", "B\n"))
            .unwrap();
        let committed = head(temp.path());

        let err = ws
            .attempt_change(Some("add C"), |root| -> io::Result<()> {
                append(root, "Gemfile", "C\n")?;
                Err(resolver_failure())
            })
            .unwrap_err();

        // The caller gets its own error back
        let fault = err.into_mutation().expect("mutation fault");
        assert_eq!(fault.kind(), io::ErrorKind::Other);
        assert_eq!(fault.to_string(), "could not resolve dependency graph");

        assert_eq!(ws.changes().len(), 2);
        assert_eq!(ws.change_attempts().len(), 3);
        assert_eq!(head(temp.path()), committed);
        assert_eq!(gemfile(&ws), format!("{GEMFILE}A\nB\n"));

        let failed = ws.failed_change_attempts();
        assert_eq!(failed.len(), 1);
        let record = failed[0];
        assert_eq!(record.memo(), Some("add C"));
        assert_eq!(
            record.error_message(),
            Some("could not resolve dependency graph")
        );
        assert!(record.error_kind().unwrap().contains("io"));
        assert_ne!(record.id(), committed);
        assert!(record.diff().contains("+C\n"));
        assert!(!record.diff().contains("+A\n"));
        assert!(!record.diff().contains("+B\n"));

        let patch = ws.to_patch().unwrap();
        assert!(patch.contains("+A\n+B\n"));
        assert!(!patch.contains("+C\n"));
    }

    #[test]
    fn test_failed_attempt_removes_new_files() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        let result = ws.attempt_change(None, |root| -> io::Result<()> {
            fs::write(root.join("Gemfile.lock"), "GEM\n")?;
            fs::create_dir_all(root.join("vendor"))?;
            fs::write(root.join("vendor").join("cache.gem"), "bin")?;
            Err(resolver_failure())
        });

        assert!(result.is_err());
        assert!(!temp.path().join("Gemfile.lock").exists());
        assert!(!temp.path().join("vendor").join("cache.gem").exists());

        let record = &ws.change_attempts()[0];
        assert!(record.diff().contains("b/Gemfile.lock"));
        assert!(record.diff().contains("b/vendor/cache.gem"));
        assert_eq!(ws.to_patch().unwrap(), "");
    }

    #[test]
    fn test_noop_success_records_empty_change() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        let value = ws
            .attempt_change(Some("nothing"), |_| Ok::<_, io::Error>(42))
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(ws.changes(), vec![""]);
        assert_eq!(ws.change_attempts()[0].id(), ws.initial_revision());
        assert_eq!(head(temp.path()), ws.initial_revision());
        assert!(!ws.is_changed());
    }

    #[test]
    fn test_noop_failure_records_current_revision() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        let _ = ws.attempt_change(None, |_| Err::<(), _>(resolver_failure()));

        let record = &ws.change_attempts()[0];
        assert!(record.is_error());
        assert_eq!(record.id(), ws.initial_revision());
        assert_eq!(record.diff(), "");
    }

    #[test]
    fn test_attempt_counts() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();
        let outcomes = [true, false, true, true, false, false, true];

        for (i, ok) in outcomes.iter().copied().enumerate() {
            let line = format!("line {i}\n");
            let _ = ws.attempt_change(None, |root| -> io::Result<()> {
                append(root, "Gemfile", &line)?;
                if ok { Ok(()) } else { Err(resolver_failure()) }
            });
        }

        let successes = outcomes.iter().filter(|ok| **ok).count();
        assert_eq!(ws.change_attempts().len(), outcomes.len());
        assert_eq!(ws.changes().len(), successes);
        assert_eq!(
            ws.failed_change_attempts().len(),
            outcomes.len() - successes
        );

        // Attempt order is execution order
        let kinds: Vec<bool> = ws
            .change_attempts()
            .iter()
            .map(ChangeAttempt::is_success)
            .collect();
        assert_eq!(kinds, outcomes);
    }

    #[test]
    fn test_memo_becomes_commit_message() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        ws.attempt_change(Some("bump rails to 7.1"), |root| {
            append(root, "Gemfile", "gem \"rails\", \"7.1\"\n")
        })
        .unwrap();
        ws.attempt_change(None, |root| append(root, "Gemfile", "gem \"pg\"\n"))
            .unwrap();

        let repo = git2::Repository::open(temp.path()).unwrap();
        let tip = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(tip.message(), Some("patchbay change"));
        assert_eq!(
            tip.parent(0).unwrap().message(),
            Some("bump rails to 7.1")
        );
    }

    #[test]
    fn test_panicking_mutation_is_reverted_then_resumed() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = ws.attempt_change(Some("explode"), |root| -> io::Result<()> {
                append(root, "Gemfile", "boom\n")?;
                panic!("build script crashed");
            });
        }));

        let payload = caught.unwrap_err();
        assert_eq!(
            payload.downcast_ref::<&str>(),
            Some(&"build script crashed")
        );

        assert_eq!(gemfile(&ws), GEMFILE);
        let record = &ws.change_attempts()[0];
        assert_eq!(record.error_kind(), Some(Fault::PANIC));
        assert_eq!(record.error_message(), Some("build script crashed"));
        assert!(record.diff().contains("+boom\n"));
    }

    #[test]
    fn test_failed_attempt_that_commits_is_rewound() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();
        let initial = ws.initial_revision();

        let err = ws
            .attempt_change(Some("npm version"), |root| -> io::Result<()> {
                append(root, "Gemfile", "X\n")?;
                commit_in(root, "bump version");
                append(root, "Gemfile", "Y\n")?;
                Err(resolver_failure())
            })
            .unwrap_err();

        assert!(!err.is_backend());
        assert_eq!(head(temp.path()), initial);
        assert_eq!(gemfile(&ws), GEMFILE);
        assert_eq!(ws.to_patch().unwrap(), "");

        let record = &ws.change_attempts()[0];
        assert!(record.is_error());
        assert_ne!(record.id(), initial);
        assert_eq!(record.diff().matches("@@ ").count(), 1);
        assert!(record.diff().contains("+X\n+Y\n"));
    }

    #[test]
    fn test_failed_attempt_that_only_commits_is_rewound() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();
        let initial = ws.initial_revision();

        let _ = ws.attempt_change(None, |root| -> io::Result<()> {
            append(root, "Gemfile", "X\n")?;
            commit_in(root, "bump version");
            Err(resolver_failure())
        });

        assert_eq!(head(temp.path()), initial);
        assert_eq!(gemfile(&ws), GEMFILE);

        let record = &ws.change_attempts()[0];
        assert_ne!(record.id(), initial);
        assert!(record.diff().contains("+X\n"));
    }

    #[test]
    fn test_successful_attempt_that_commits_is_kept() {
        let temp = init_test_repo();
        let mut ws = Workspace::open(temp.path()).unwrap();

        ws.attempt_change(Some("npm version"), |root| -> io::Result<()> {
            append(root, "Gemfile", "X\n")?;
            commit_in(root, "bump version");
            Ok(())
        })
        .unwrap();

        let record = &ws.change_attempts()[0];
        assert_eq!(record.id(), head(temp.path()));
        assert!(record.diff().contains("+X\n"));
        assert!(ws.is_changed());
        assert!(ws.to_patch().unwrap().contains("+X\n"));
    }

    #[test]
    fn test_failed_attempt_stashes_ignored_files_when_configured() {
        let temp = init_test_repo();
        fs::write(temp.path().join(".gitignore"), "vendor/\n").unwrap();
        commit_in(temp.path(), "ignore vendor");

        let mut config = Config::default();
        config.snapshot.include_ignored = true;
        let mut ws = Workspace::open_with_config(temp.path(), config).unwrap();

        let _ = ws.attempt_change(Some("vendor gems"), |root| -> io::Result<()> {
            fs::create_dir_all(root.join("vendor"))?;
            fs::write(root.join("vendor").join("x.gem"), "gem\n")?;
            Err(resolver_failure())
        });

        assert!(!temp.path().join("vendor").join("x.gem").exists());
        let record = &ws.change_attempts()[0];
        assert_ne!(record.id(), ws.initial_revision());
        assert!(record.diff().contains("b/vendor/x.gem"));
    }

    #[test]
    fn test_failed_attempt_keeps_ignored_files_by_default() {
        let temp = init_test_repo();
        fs::write(temp.path().join(".gitignore"), "vendor/\n").unwrap();
        commit_in(temp.path(), "ignore vendor");
        let mut ws = Workspace::open(temp.path()).unwrap();

        let _ = ws.attempt_change(None, |root| -> io::Result<()> {
            fs::create_dir_all(root.join("vendor"))?;
            fs::write(root.join("vendor").join("x.gem"), "gem\n")?;
            Err(resolver_failure())
        });

        assert!(temp.path().join("vendor").join("x.gem").exists());
        assert_eq!(ws.change_attempts()[0].diff(), "");
    }

    #[test]
    fn test_fallback_identity_from_config() {
        let temp = init_test_repo();
        let repo = git2::Repository::open(temp.path()).unwrap();
        let mut local = repo
            .config()
            .unwrap()
            .open_level(git2::ConfigLevel::Local)
            .unwrap();
        local.remove("user.name").unwrap();
        local.remove("user.email").unwrap();

        let mut config = Config::default();
        config.commit.author_name = "Update Bot".into();
        config.commit.author_email = "bot@example.com".into();
        let mut ws = Workspace::open_with_config(temp.path(), config).unwrap();

        let result =
            ws.attempt_change(None, |root| append(root, "Gemfile", "gem \"pg\"\n"));

        // A global identity may exist on the host; either way the commit lands.
        assert!(result.is_ok());
        let tip = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(tip.author().name().is_some());
    }

    /// Backend whose commits always fail.
    struct BrokenBackend {
        dir: PathBuf,
    }

    impl Backend for BrokenBackend {
        fn workdir(&self) -> &Path {
            &self.dir
        }

        fn current_revision(&self) -> patchbay_git::Result<Oid> {
            Ok(Oid::zero())
        }

        fn diff(&self, _from: Oid, _to: Oid) -> patchbay_git::Result<String> {
            Ok(String::new())
        }

        fn has_changes(&self) -> patchbay_git::Result<bool> {
            Ok(true)
        }

        fn staged_diff(&self) -> patchbay_git::Result<String> {
            Ok("+pending\n".into())
        }

        fn commit(&self, _label: &str) -> patchbay_git::Result<Oid> {
            Err(git2::Error::from_str("index.lock exists").into())
        }

        fn reset_hard(&self, _revision: Oid) -> patchbay_git::Result<()> {
            Ok(())
        }

        fn snapshot_and_revert(&mut self, _label: &str) -> patchbay_git::Result<Option<Oid>> {
            Err(git2::Error::from_str("stash failed").into())
        }

        fn diff_of_snapshot(&self, snapshot: Oid) -> patchbay_git::Result<String> {
            Err(patchbay_git::Error::SnapshotNotFound(snapshot))
        }

        fn diff_of_snapshot_from(
            &self,
            snapshot: Oid,
            _base: Oid,
        ) -> patchbay_git::Result<String> {
            Err(patchbay_git::Error::SnapshotNotFound(snapshot))
        }
    }

    #[test]
    fn test_commit_failure_is_backend_error() {
        let temp = TempDir::new().unwrap();
        let backend = BrokenBackend {
            dir: temp.path().to_path_buf(),
        };
        let mut ws = Workspace::new(backend, Config::default()).unwrap();

        let err = ws
            .attempt_change(None, |_| Ok::<_, io::Error>(()))
            .unwrap_err();

        assert!(err.is_backend());
        assert!(err.to_string().contains("index.lock exists"));
        assert!(ws.change_attempts().is_empty());
    }

    #[test]
    fn test_snapshot_failure_is_not_a_failed_attempt() {
        let temp = TempDir::new().unwrap();
        let backend = BrokenBackend {
            dir: temp.path().to_path_buf(),
        };
        let mut ws = Workspace::new(backend, Config::default()).unwrap();

        let err = ws
            .attempt_change(None, |_| Err::<(), _>(resolver_failure()))
            .unwrap_err();

        assert!(err.is_backend());
        assert!(ws.failed_change_attempts().is_empty());
    }
}
