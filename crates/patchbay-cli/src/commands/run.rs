//! `patchbay run` command - Attempt each step of a plan in a workspace.

use std::fs;

use anyhow::{Context, Result};
use patchbay_core::{AttemptError, ChangeAttempt, Config, Workspace};
use serde::Serialize;

use super::RunArgs;
use crate::output;
use crate::plan::Plan;

/// JSON report of a run.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    initial_revision: String,
    succeeded: usize,
    failed: usize,
    attempts: &'a [ChangeAttempt],
    patch: String,
}

/// Run the plan. Returns `false` if any step failed.
pub fn run(args: &RunArgs) -> Result<bool> {
    let plan = Plan::load(&args.plan)?;

    let mut workspace = match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            Workspace::open_with_config(&args.repo, config)?
        }
        None => Workspace::open(&args.repo)?,
    };

    output::info(&format!(
        "Running {} step(s) from {}",
        plan.steps.len(),
        workspace.initial_revision()
    ));

    for step in &plan.steps {
        let label = step.label();
        match workspace.attempt_change(step.memo.as_deref(), |root| step.execute(root)) {
            Ok(()) => output::success(&label),
            Err(AttemptError::Mutation(err)) => {
                output::warn(&format!("{label}: {err}"));
                if args.fail_fast {
                    output::info("Stopping at first failure (--fail-fast)");
                    break;
                }
            }
            Err(AttemptError::Backend(err)) => {
                return Err(err).context(
                    "Workspace bookkeeping failed - the working tree may hold partial changes",
                );
            }
        }
    }

    let patch = workspace.to_patch()?;
    let failed = workspace.failed_change_attempts().len();
    let succeeded = workspace.changes().len();

    if args.json {
        let report = JsonReport {
            initial_revision: workspace.initial_revision().to_string(),
            succeeded,
            failed,
            attempts: workspace.change_attempts(),
            patch: patch.clone(),
        };
        output::essential(&format!("{}\n", serde_json::to_string_pretty(&report)?));
    }

    match &args.patch_out {
        Some(path) => {
            fs::write(path, &patch)
                .with_context(|| format!("Failed to write patch to {}", path.display()))?;
            output::info(&format!("Patch written to {}", path.display()));
        }
        None if !args.json => output::essential(&patch),
        None => {}
    }

    output::detail("");
    for attempt in workspace.change_attempts() {
        output::detail(&output::attempt_line(attempt));
    }
    output::info(&format!("{succeeded} succeeded, {failed} failed"));

    if !workspace.is_changed() {
        output::warn("No step changed the working tree");
    }

    Ok(failed == 0)
}
