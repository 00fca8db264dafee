#![forbid(unsafe_code)]

//! State synchronizer.
//!
//! Reconciles cached job records with the scheduler's live queue and its
//! accounting history in a bounded number of subprocess calls: one live
//! batch query for everything possibly active, one history batch for ids
//! the live queue no longer knows, and a per-id detail query only when the
//! history backend is missing on this host. The synchronizer holds no state
//! between calls.

use crate::ManagerError;
use gq_core::state::JobState;
use gq_slurm::{JobStatus, QueryError, Scheduler};
use gq_storage::{JobRow, SqliteStore, StoreError};
use std::collections::HashMap;

/// A job row plus the outcome of the refresh that produced it.
#[derive(Debug)]
pub struct RefreshedJob {
    pub row: JobRow,
    /// True when the state comes from a successful query in this call (or
    /// is a previously observed terminal state, which cannot change).
    pub fresh: bool,
    /// Per-job diagnostic when every backend failed for this id. The row
    /// then keeps its last cached state and renders as UNKNOWN.
    pub note: Option<String>,
}

impl RefreshedJob {
    fn current(row: JobRow) -> Self {
        Self {
            row,
            fresh: true,
            note: None,
        }
    }

    fn unrefreshed(row: JobRow, note: impl Into<String>) -> Self {
        Self {
            row,
            fresh: false,
            note: Some(note.into()),
        }
    }

    /// Display form of the state: `COMPLETED (0)` when an exit code is
    /// known, `UNKNOWN` when this refresh could not reach any backend.
    pub fn state_label(&self) -> String {
        if !self.fresh && self.note.is_some() {
            return JobState::Unknown.as_str().to_string();
        }
        match self.row.exit_code {
            Some(code) => format!("{} ({code})", self.row.state),
            None => self.row.state.to_string(),
        }
    }
}

/// Refresh the given rows against the scheduler and persist successful
/// observations. Terminal rows are returned as-is unless `force` is set; a
/// terminal state never changes once reached. Per-job query failures are
/// reported on the row, never as a failure of the whole batch.
pub fn refresh_jobs<S: Scheduler>(
    store: &mut SqliteStore,
    scheduler: &S,
    rows: Vec<JobRow>,
    force: bool,
) -> Result<Vec<RefreshedJob>, ManagerError> {
    let mut queried_ids = Vec::new();
    for row in &rows {
        if (force || !row.state.is_terminal())
            && let Some(slurm_id) = row.slurm_id
        {
            queried_ids.push(slurm_id);
        }
    }

    let statuses = collect_statuses(scheduler, &queried_ids);

    let mut updates = Vec::new();
    let mut refreshed = Vec::with_capacity(rows.len());
    for mut row in rows {
        if !force && row.state.is_terminal() {
            refreshed.push(RefreshedJob::current(row));
            continue;
        }
        let Some(slurm_id) = row.slurm_id else {
            refreshed.push(RefreshedJob::unrefreshed(row, "no scheduler id recorded"));
            continue;
        };
        match statuses.get(&slurm_id) {
            Some(Ok(status)) => {
                row.state = status.state.clone();
                row.exit_code = status.exit_code;
                row.nodes = status.nodes.clone();
                updates.push((row.id, row.state.clone(), row.exit_code, row.nodes.clone()));
                refreshed.push(RefreshedJob::current(row));
            }
            Some(Err(note)) => refreshed.push(RefreshedJob::unrefreshed(row, note.clone())),
            None => refreshed.push(RefreshedJob::unrefreshed(row, "not queried")),
        }
    }

    if !updates.is_empty() {
        match store.update_states(&updates) {
            Ok(()) => {}
            // Degraded mode: a read-only store can still serve a listing;
            // the fresh states just are not cached for the next run.
            Err(StoreError::ReadOnly) => {}
            Err(err) => return Err(ManagerError::Store(err)),
        }
    }
    Ok(refreshed)
}

/// Query the backends in escalation order and return one result per
/// scheduler id.
fn collect_statuses<S: Scheduler>(
    scheduler: &S,
    ids: &[i64],
) -> HashMap<i64, Result<JobStatus, String>> {
    let mut statuses: HashMap<i64, Result<JobStatus, String>> = HashMap::new();
    if ids.is_empty() {
        return statuses;
    }

    // Live first: at the query instant it is fresher than accounting, so
    // when the two would disagree the live answer wins by construction
    // (only ids absent from the live response are escalated).
    // A dead live backend reads like an empty live queue; history still
    // gets its chance below.
    let live = scheduler.query_live(ids).unwrap_or_default();
    for (slurm_id, status) in live {
        statuses.insert(slurm_id, Ok(status));
    }

    let missing: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|id| !statuses.contains_key(id))
        .collect();
    if missing.is_empty() {
        return statuses;
    }

    match scheduler.query_history(&missing) {
        Ok(history) => {
            for id in &missing {
                match history.get(id) {
                    Some(status) => {
                        statuses.insert(*id, Ok(status.clone()));
                    }
                    None => {
                        statuses.insert(
                            *id,
                            Err(format!("scheduler no longer reports job {id}")),
                        );
                    }
                }
            }
        }
        Err(QueryError::Unavailable(_)) | Err(QueryError::Failed { .. }) => {
            // Accounting is missing or broken on this host; fall back to
            // one detail query per job rather than failing the batch.
            for id in &missing {
                let outcome = match scheduler.query_detail(*id) {
                    Ok(Some(status)) => Ok(status),
                    Ok(None) => Err(format!("scheduler no longer reports job {id}")),
                    Err(err) => Err(err.to_string()),
                };
                statuses.insert(*id, outcome);
            }
        }
    }
    statuses
}
