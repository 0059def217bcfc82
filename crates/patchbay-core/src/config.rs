//! Configuration management for patchbay.

use std::fs;
use std::path::{Path, PathBuf};

use patchbay_git::Identity;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Patchbay configuration loaded from `.git/patchbay/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How accepted changes are committed.
    #[serde(default)]
    pub commit: CommitConfig,

    /// How rejected changes are snapshotted.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Config {
    /// Directory and file name under the git dir.
    const DIR: &'static str = "patchbay";
    const FILE: &'static str = "config.toml";

    /// Default config location for a repository's git dir.
    #[must_use]
    pub fn default_path(git_dir: impl AsRef<Path>) -> PathBuf {
        git_dir.as_ref().join(Self::DIR).join(Self::FILE)
    }

    /// Load config from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::ConfigParseError {
            file: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Save config to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Identity used for commits when git config has none.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            name: self.commit.author_name.clone(),
            email: self.commit.author_email.clone(),
        }
    }
}

/// Commit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Commit message for attempts without a memo.
    #[serde(default = "default_message")]
    pub message: String,

    /// Stash message for failed attempts without a memo.
    #[serde(default = "default_snapshot_message")]
    pub snapshot_message: String,

    /// Fallback author name.
    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Fallback author email.
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            message: default_message(),
            snapshot_message: default_snapshot_message(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

fn default_message() -> String {
    "patchbay change".into()
}

fn default_snapshot_message() -> String {
    "patchbay change attempt".into()
}

fn default_author_name() -> String {
    "patchbay".into()
}

fn default_author_email() -> String {
    "patchbay@localhost".into()
}

/// Snapshot settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Also stash (and so remove) ignored files a failed attempt left behind.
    #[serde(default)]
    pub include_ignored: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.commit.message, "patchbay change");
        assert_eq!(config.commit.snapshot_message, "patchbay change attempt");
        assert_eq!(config.identity().email, "patchbay@localhost");
        assert!(!config.snapshot.include_ignored);
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = Config::default_path(temp.path());

        let config = Config {
            commit: CommitConfig {
                message: "bump".into(),
                author_name: "Bot".into(),
                ..CommitConfig::default()
            },
            snapshot: SnapshotConfig {
                include_ignored: true,
            },
        };

        config.save(&path).unwrap();
        assert!(path.ends_with("patchbay/config.toml"));
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[snapshot]\ninclude_ignored = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.snapshot.include_ignored);
        assert_eq!(config.commit, CommitConfig::default());
    }

    #[test]
    fn test_invalid_config_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[commit]\nmessage = 3\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParseError { ref file, .. } if *file == path));
    }

    #[test]
    fn test_missing_config_returns_default() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
