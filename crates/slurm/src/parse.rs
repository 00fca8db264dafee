#![forbid(unsafe_code)]

//! Parsers for the scheduler tools' textual and JSON output.

use crate::JobStatus;
use gq_core::state::JobState;
use serde::Deserialize;

/// Extract the job id from sbatch's acknowledgment line, which looks like
/// `Submitted batch job 123456789`. The first integer token is the id.
pub(crate) fn parse_submit_output(stdout: &str) -> Option<i64> {
    let bytes = stdout.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            return stdout[start..i].parse().ok();
        }
        i += 1;
    }
    None
}

/// One `squeue --noheader -o "%i|%T|%N"` line: id, long state name, node
/// list. The live queue has no exit codes. Array tasks print compound ids
/// like `123_4` or `123_[0-15]`; they fold into the master id, so an array
/// job with several live tasks yields several entries for the same id.
pub(crate) fn parse_squeue_line(line: &str) -> Option<(i64, JobStatus)> {
    let mut fields = line.trim().split('|');
    let raw_id = fields.next()?.trim();
    let master = raw_id.split('_').next().unwrap_or(raw_id);
    let id = master.parse::<i64>().ok()?;
    let state = JobState::from_token(fields.next()?);
    let nodes = fields
        .next()
        .map(str::trim)
        .filter(|nodes| !nodes.is_empty())
        .map(str::to_string);
    Some((
        id,
        JobStatus {
            state,
            exit_code: None,
            nodes,
        },
    ))
}

/// `scontrol show job <id> --oneliner` prints space-separated `Key=Value`
/// tokens. We only need JobState, ExitCode and NodeList.
pub(crate) fn parse_scontrol_oneliner(output: &str) -> Option<JobStatus> {
    let mut state = None;
    let mut exit_code = None;
    let mut nodes = None;
    for token in output.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "JobState" => state = Some(JobState::from_token(value)),
            // ExitCode is "<code>:<signal>".
            "ExitCode" => {
                exit_code = value.split(':').next().and_then(|code| code.parse::<i64>().ok());
            }
            "NodeList" => {
                if value != "(null)" && !value.is_empty() {
                    nodes = Some(value.to_string());
                }
            }
            _ => {}
        }
    }
    state.map(|state| JobStatus {
        state,
        exit_code,
        nodes,
    })
}

/// Typed view of `sacct --json`. Only the fields the synchronizer consumes
/// are modeled; everything else in the payload is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct SacctReport {
    pub(crate) jobs: Vec<SacctJob>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SacctJob {
    pub(crate) job_id: i64,
    pub(crate) state: SacctState,
    #[serde(default)]
    pub(crate) nodes: Option<String>,
    #[serde(default)]
    pub(crate) derived_exit_code: Option<SacctExitCode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SacctState {
    #[serde(default)]
    pub(crate) current: Vec<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SacctExitCode {
    #[serde(default)]
    pub(crate) return_code: Option<SacctReturnCode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SacctReturnCode {
    #[serde(default)]
    pub(crate) number: Option<i64>,
}

impl SacctJob {
    pub(crate) fn status(&self) -> JobStatus {
        let state = self
            .state
            .current
            .first()
            .map(|token| JobState::from_token(token))
            .unwrap_or(JobState::Unknown);
        let exit_code = self
            .derived_exit_code
            .as_ref()
            .and_then(|exit| exit.return_code.as_ref())
            .and_then(|code| code.number);
        // While a job is pending sacct reports "None assigned"; the reason
        // field then carries the more useful queue diagnostic.
        let nodes = match self.nodes.as_deref() {
            None | Some("") => None,
            Some("None assigned") => self.state.reason.clone(),
            Some(assigned) => Some(assigned.to_string()),
        };
        JobStatus {
            state,
            exit_code,
            nodes,
        }
    }
}
