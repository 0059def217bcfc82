//! Records of individual change attempts.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use patchbay_git::Oid;
use serde::{Serialize, Serializer};

/// Outcome of one mutation run inside a [`crate::Workspace`].
///
/// Created once when the attempt finishes and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeAttempt {
    /// Commit id on success, stash id on failure.
    #[serde(serialize_with = "serialize_oid")]
    id: Oid,
    /// Changes the attempt introduced, relative to the state before it ran.
    diff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Fault>,
    finished_at: DateTime<Utc>,
}

impl ChangeAttempt {
    /// Record an attempt whose mutation returned normally.
    #[must_use]
    pub fn succeeded(id: Oid, diff: String, memo: Option<&str>) -> Self {
        Self {
            id,
            diff,
            memo: memo.map(String::from),
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Record an attempt whose mutation failed with `fault`.
    #[must_use]
    pub fn failed(id: Oid, diff: String, memo: Option<&str>, fault: Fault) -> Self {
        Self {
            id,
            diff,
            memo: memo.map(String::from),
            error: Some(fault),
            finished_at: Utc::now(),
        }
    }

    /// Revision (success) or snapshot (failure) holding this attempt's content.
    #[must_use]
    pub const fn id(&self) -> Oid {
        self.id
    }

    /// Unified diff of the attempt's changes; empty if it changed nothing.
    #[must_use]
    pub fn diff(&self) -> &str {
        &self.diff
    }

    /// Caller-supplied label, if any.
    #[must_use]
    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    /// The captured fault, for failed attempts.
    #[must_use]
    pub const fn error(&self) -> Option<&Fault> {
        self.error.as_ref()
    }

    /// When the attempt was recorded.
    #[must_use]
    pub const fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Whether the mutation failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the mutation returned normally.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Type of the captured fault.
    #[must_use]
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(Fault::kind)
    }

    /// Message of the captured fault, verbatim.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(Fault::message)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_oid<S: Serializer>(oid: &Oid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(oid)
}

/// A fault captured from a failed mutation: its type and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    kind: String,
    message: String,
}

impl Fault {
    /// Kind reported for mutations that panicked.
    pub const PANIC: &'static str = "panic";

    /// Build a fault record.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture an error value, using its type name as the kind.
    pub fn from_error<E: fmt::Display>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }

    /// Capture a panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(Self::PANIC, message)
    }

    /// Type name of the error, or [`Fault::PANIC`].
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Display text of the error or panic payload.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
