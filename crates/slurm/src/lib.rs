#![forbid(unsafe_code)]

//! Scheduler gateway.
//!
//! Everything that talks to the batch scheduler's command-line tools lives
//! here: `sbatch` for submission, `squeue` for the live queue, `sacct` for
//! accounting history, `scontrol` as a single-id fallback when `sacct` is
//! absent, and `scancel` for cancellation. The rest of the system only sees
//! the [`Scheduler`] trait and typed results, so tests substitute a stub and
//! tool unavailability stays an error value instead of a crash.

mod client;
mod parse;
mod probe;

pub use client::SlurmClient;

use gq_core::state::JobState;
use std::collections::HashMap;

/// One job's status as reported by any of the query backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub exit_code: Option<i64>,
    pub nodes: Option<String>,
}

#[derive(Debug)]
pub enum SubmitError {
    /// The argv was empty or malformed before any subprocess was launched.
    Invalid(&'static str),
    /// The submission command could not be spawned at all.
    Spawn(std::io::Error),
    /// The command ran but exited non-zero. Carries the raw output for
    /// diagnosis.
    CommandFailed { status: Option<i32>, output: String },
    /// The command exited zero but no job id could be parsed from stdout.
    /// Distinct from `CommandFailed`: the scheduler may have accepted the
    /// job even though we cannot tell which one it is.
    ParseId { output: String },
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(message) => write!(f, "invalid submission: {message}"),
            Self::Spawn(err) => write!(f, "failed to run submission command: {err}"),
            Self::CommandFailed { status, output } => match status {
                Some(code) => write!(f, "submission failed (exit {code}): {}", output.trim()),
                None => write!(f, "submission terminated by signal: {}", output.trim()),
            },
            Self::ParseId { output } => {
                write!(f, "could not parse job id from scheduler output: {}", output.trim())
            }
        }
    }
}

impl std::error::Error for SubmitError {}

#[derive(Debug)]
pub enum QueryError {
    /// The query tool is not installed or could not be launched. Callers
    /// fall back to another backend instead of failing the whole operation.
    Unavailable(String),
    /// The tool ran but its output could not be used.
    Failed { output: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "scheduler query unavailable: {message}"),
            Self::Failed { output } => write!(f, "scheduler query failed: {}", output.trim()),
        }
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug)]
pub enum CancelError {
    Spawn(std::io::Error),
    CommandFailed { output: String },
}

impl std::fmt::Display for CancelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(err) => write!(f, "failed to run cancel command: {err}"),
            Self::CommandFailed { output } => write!(f, "cancel failed: {}", output.trim()),
        }
    }
}

impl std::error::Error for CancelError {}

/// The gateway contract. `submit` and `cancel` mutate scheduler state; the
/// three queries are idempotent reads and always safe to retry.
pub trait Scheduler {
    /// Run the submission argv (`argv[0]` is the command itself) and return
    /// the scheduler-assigned job id parsed from its output.
    fn submit(&self, argv: &[String]) -> Result<i64, SubmitError>;

    /// Status of ids still visible in the live queue, one batched call.
    /// Ids the scheduler has already purged are simply absent from the map.
    fn query_live(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError>;

    /// Status from the accounting backend, for ids no longer enumerable
    /// live. May be `Unavailable` on hosts without the accounting tool.
    fn query_history(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError>;

    /// Last-resort single-id detail query. `Ok(None)` means the scheduler
    /// no longer knows the id at all.
    fn query_detail(&self, id: i64) -> Result<Option<JobStatus>, QueryError>;

    fn cancel(&self, id: i64) -> Result<(), CancelError>;
}
