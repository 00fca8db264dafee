#![forbid(unsafe_code)]

/// Normalized job states. Raw scheduler tokens are folded into this closed
/// set through [`JobState::from_token`]; tokens we do not recognize are kept
/// verbatim in `Unrecognized` so new scheduler states surface instead of
/// being silently mapped onto a known one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    NodeFail,
    BootFail,
    OutOfMemory,
    Preempted,
    Deadline,
    Unknown,
    Unrecognized(String),
}

/// Raw token to normalized state. Short codes are what `squeue` prints with
/// `%t`; long names come from `sacct`/`scontrol`. Transient scheduler-side
/// phases fold into the nearest stable state (COMPLETING is still consuming
/// the allocation, so it counts as RUNNING; CONFIGURING and the requeue
/// family have not started consuming it, so they count as PENDING).
const STATE_TOKENS: &[(&str, JobState)] = &[
    ("PD", JobState::Pending),
    ("PENDING", JobState::Pending),
    ("CF", JobState::Pending),
    ("CONFIGURING", JobState::Pending),
    ("RQ", JobState::Pending),
    ("REQUEUED", JobState::Pending),
    ("RH", JobState::Pending),
    ("REQUEUE_HOLD", JobState::Pending),
    ("RF", JobState::Pending),
    ("REQUEUE_FED", JobState::Pending),
    ("RD", JobState::Pending),
    ("RESV_DEL_HOLD", JobState::Pending),
    ("RV", JobState::Pending),
    ("REVOKED", JobState::Pending),
    ("SE", JobState::Pending),
    ("SPECIAL_EXIT", JobState::Pending),
    ("R", JobState::Running),
    ("RUNNING", JobState::Running),
    ("CG", JobState::Running),
    ("COMPLETING", JobState::Running),
    ("SO", JobState::Running),
    ("STAGE_OUT", JobState::Running),
    ("RS", JobState::Running),
    ("RESIZING", JobState::Running),
    ("SI", JobState::Running),
    ("SIGNALING", JobState::Running),
    ("S", JobState::Suspended),
    ("SUSPENDED", JobState::Suspended),
    ("ST", JobState::Suspended),
    ("STOPPED", JobState::Suspended),
    ("CD", JobState::Completed),
    ("COMPLETED", JobState::Completed),
    ("F", JobState::Failed),
    ("FAILED", JobState::Failed),
    ("CA", JobState::Cancelled),
    ("CANCELLED", JobState::Cancelled),
    ("TO", JobState::Timeout),
    ("TIMEOUT", JobState::Timeout),
    ("NF", JobState::NodeFail),
    ("NODE_FAIL", JobState::NodeFail),
    ("BF", JobState::BootFail),
    ("BOOT_FAIL", JobState::BootFail),
    ("OOM", JobState::OutOfMemory),
    ("OUT_OF_MEMORY", JobState::OutOfMemory),
    ("PR", JobState::Preempted),
    ("PREEMPTED", JobState::Preempted),
    ("DL", JobState::Deadline),
    ("DEADLINE", JobState::Deadline),
    ("UN", JobState::Unknown),
    ("UNKNOWN", JobState::Unknown),
];

impl JobState {
    /// Terminal states that mean the job did not run to successful
    /// completion. A resubmit with no selection targets exactly this set;
    /// COMPLETED, PREEMPTED and DEADLINE are not in it.
    pub const FAILED_STATES: &[JobState] = &[
        JobState::BootFail,
        JobState::Cancelled,
        JobState::Failed,
        JobState::NodeFail,
        JobState::OutOfMemory,
        JobState::Timeout,
    ];

    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        // `sacct` reports cancelled-by-user as e.g. "CANCELLED by 1000".
        let token = token.split_whitespace().next().unwrap_or("");
        let upper = token.to_ascii_uppercase();
        for (raw, state) in STATE_TOKENS {
            if *raw == upper {
                return state.clone();
            }
        }
        if upper.is_empty() {
            return JobState::Unknown;
        }
        JobState::Unrecognized(upper)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Suspended => "SUSPENDED",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
            JobState::Timeout => "TIMEOUT",
            JobState::NodeFail => "NODE_FAIL",
            JobState::BootFail => "BOOT_FAIL",
            JobState::OutOfMemory => "OUT_OF_MEMORY",
            JobState::Preempted => "PREEMPTED",
            JobState::Deadline => "DEADLINE",
            JobState::Unknown => "UNKNOWN",
            JobState::Unrecognized(raw) => raw,
        }
    }

    /// Terminal states never change once observed; the synchronizer skips
    /// re-querying them and resubmission is only allowed from them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed
                | JobState::Failed
                | JobState::Cancelled
                | JobState::Timeout
                | JobState::NodeFail
                | JobState::BootFail
                | JobState::OutOfMemory
                | JobState::Preempted
                | JobState::Deadline
        )
    }

    /// All states a user may name in a `--state` filter, long form.
    pub fn all_names() -> Vec<&'static str> {
        let mut names = Vec::new();
        for (raw, _) in STATE_TOKENS {
            if raw.len() > 3 && !names.contains(raw) {
                names.push(*raw);
            }
        }
        names
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
