#![forbid(unsafe_code)]

use crate::parse::{
    SacctReport, parse_scontrol_oneliner, parse_squeue_line, parse_submit_output,
};
use crate::probe::find_executable_in_path;
use crate::{CancelError, JobStatus, QueryError, Scheduler, SubmitError};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::process::{Command, Output};

const SQUEUE_BIN: &str = "squeue";
const SACCT_BIN: &str = "sacct";
const SCONTROL_BIN: &str = "scontrol";
const SCANCEL_BIN: &str = "scancel";

/// Gateway to a real SLURM installation. Tool availability is probed once
/// per client, which scopes the probe to a single batch operation in the
/// short-lived CLI process.
#[derive(Debug, Default)]
pub struct SlurmClient {
    sacct_available: OnceCell<bool>,
}

impl SlurmClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn sacct_available(&self) -> bool {
        *self
            .sacct_available
            .get_or_init(|| find_executable_in_path(SACCT_BIN).is_some())
    }
}

fn joined_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    text
}

impl Scheduler for SlurmClient {
    fn submit(&self, argv: &[String]) -> Result<i64, SubmitError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(SubmitError::Invalid("empty submission argv"));
        };
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(SubmitError::Spawn)?;
        if !output.status.success() {
            return Err(SubmitError::CommandFailed {
                status: output.status.code(),
                output: combined_output(&output),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_submit_output(&stdout).ok_or_else(|| SubmitError::ParseId {
            output: combined_output(&output),
        })
    }

    fn query_live(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let output = Command::new(SQUEUE_BIN)
            .arg("--noheader")
            .arg("-o")
            .arg("%i|%T|%N")
            .arg("-j")
            .arg(joined_ids(ids))
            .output()
            .map_err(|err| QueryError::Unavailable(format!("{SQUEUE_BIN}: {err}")))?;
        // squeue exits non-zero when any requested id has already left the
        // queue ("Invalid job id specified"). That is the normal way jobs
        // age out of the live view, so it reads as an empty result and the
        // caller escalates to the accounting backend.
        if !output.status.success() {
            return Ok(HashMap::new());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_squeue_line).collect())
    }

    fn query_history(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        if !self.sacct_available() {
            return Err(QueryError::Unavailable(format!(
                "{SACCT_BIN} not found in PATH"
            )));
        }
        let output = Command::new(SACCT_BIN)
            .arg("-j")
            .arg(joined_ids(ids))
            .arg("--json")
            .output()
            .map_err(|err| QueryError::Unavailable(format!("{SACCT_BIN}: {err}")))?;
        if !output.status.success() {
            return Err(QueryError::Failed {
                output: combined_output(&output),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let report: SacctReport = serde_json::from_str(&stdout).map_err(|err| {
            QueryError::Failed {
                output: format!("unparseable {SACCT_BIN} json: {err}"),
            }
        })?;
        Ok(report
            .jobs
            .iter()
            .map(|job| (job.job_id, job.status()))
            .collect())
    }

    fn query_detail(&self, id: i64) -> Result<Option<JobStatus>, QueryError> {
        let output = Command::new(SCONTROL_BIN)
            .arg("show")
            .arg("job")
            .arg(id.to_string())
            .arg("--oneliner")
            .output()
            .map_err(|err| QueryError::Unavailable(format!("{SCONTROL_BIN}: {err}")))?;
        // scontrol forgets finished jobs after a few minutes; an error here
        // means the id is simply gone, not that the backend is broken.
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_scontrol_oneliner(&stdout))
    }

    fn cancel(&self, id: i64) -> Result<(), CancelError> {
        let output = Command::new(SCANCEL_BIN)
            .arg(id.to_string())
            .output()
            .map_err(CancelError::Spawn)?;
        if !output.status.success() {
            return Err(CancelError::CommandFailed {
                output: combined_output(&output),
            });
        }
        Ok(())
    }
}
