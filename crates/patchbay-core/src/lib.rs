//! # patchbay-core
//!
//! Transactional change-tracking workspace. Runs caller-supplied
//! mutations against a git working tree, commits the ones that succeed,
//! stashes and reverts the ones that fail, and exposes everything that
//! succeeded as one cumulative patch.

pub mod attempt;
pub mod config;
pub mod error;
pub mod workspace;

pub use attempt::{ChangeAttempt, Fault};
pub use config::Config;
pub use error::{AttemptError, Error, Result};
pub use patchbay_git::{Backend, Oid};
pub use workspace::Workspace;
