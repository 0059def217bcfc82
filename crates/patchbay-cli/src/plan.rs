//! Plans: ordered lists of shell steps to attempt against a checkout.
//!
//! ```toml
//! [[step]]
//! memo = "bump rails to 7.1"
//! command = ["bundle", "update", "rails"]
//!
//! [[step]]
//! memo = "regenerate lockfile"
//! dir = "frontend"
//! command = ["npm", "install", "--package-lock-only"]
//! env = { CI = "1" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Lines of stderr kept in a step failure.
const STDERR_TAIL_LINES: usize = 20;

/// A parsed plan file.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Load a plan from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid plan {}", path.display()))
    }

    /// Parse a plan, rejecting steps whose `dir` leaves the working tree.
    pub fn parse(content: &str) -> Result<Self> {
        let plan: Self = toml::from_str(content)?;
        for (i, step) in plan.steps.iter().enumerate() {
            if let Some(dir) = step.dir.as_deref().filter(|d| !is_inside_tree(d)) {
                bail!(
                    "step {} ({}): dir `{}` must be a relative path inside the working tree",
                    i + 1,
                    step.label(),
                    dir.display()
                );
            }
        }
        Ok(plan)
    }
}

/// One command to run as a change attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Label recorded on the attempt and used as the commit message.
    pub memo: Option<String>,
    /// Program and arguments.
    pub command: Vec<String>,
    /// Directory relative to the working tree root.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Why a step's command failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The step has no program to run.
    #[error("step has an empty command")]
    EmptyCommand,

    /// The program could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The step's directory is outside the working tree.
    #[error("dir `{}` is outside the working tree", .0.display())]
    OutsideTree(PathBuf),

    /// The program ran and reported failure.
    #[error("`{program}` failed ({status}){}", format_stderr(.stderr))]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl Step {
    /// Display name: the memo, or the command line.
    #[must_use]
    pub fn label(&self) -> String {
        self.memo
            .clone()
            .unwrap_or_else(|| self.command.join(" "))
    }

    /// Run the command inside `root`, blocking until it exits.
    pub fn execute(&self, root: &Path) -> std::result::Result<(), StepError> {
        let (program, args) = self.command.split_first().ok_or(StepError::EmptyCommand)?;
        let cwd = match &self.dir {
            Some(dir) if !is_inside_tree(dir) => return Err(StepError::OutsideTree(dir.clone())),
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        };

        tracing::debug!(%program, ?args, cwd = %cwd.display(), "running step");
        let output = Command::new(program)
            .args(args)
            .current_dir(&cwd)
            .envs(&self.env)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| StepError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(StepError::Failed {
            program: program.clone(),
            status: output.status,
            stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// Whether `dir` stays under the root it is joined to.
fn is_inside_tree(dir: &Path) -> bool {
    dir.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Last few non-empty lines of a command's stderr.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
