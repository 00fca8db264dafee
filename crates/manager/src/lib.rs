#![forbid(unsafe_code)]

//! Job lifecycle manager.
//!
//! Compound operations over the record store and the scheduler gateway:
//! submit, list, stop, resubmit, delete. The manager enforces the registry
//! invariants (stable local ids, dependency rewriting at submission time,
//! resubmission only from terminal states) and owns nothing ambient; store
//! path and logs directory are constructor arguments, so several managers
//! can coexist in one process.

pub mod script;
pub mod sync;

pub use sync::{RefreshedJob, refresh_jobs};

use gq_core::TOOL_NAME;
use gq_core::deps::{job_ids_from_spec, replace_job_ids_in_spec};
use gq_core::select::parse_array_indexes;
use gq_core::state::JobState;
use gq_slurm::{CancelError, Scheduler, SubmitError};
use gq_storage::{JobFilter, JobRow, NewJob, SqliteStore, StoreError, output_template_for};
use script::{INLINE_SEPARATOR, TempScript};
use std::path::{Path, PathBuf};

const SBATCH_BIN: &str = "sbatch";

#[derive(Debug)]
pub enum ManagerError {
    Store(StoreError),
    Submit(SubmitError),
    Cancel { id: i64, source: CancelError },
    Io(std::io::Error),
    /// Operation referenced a local id absent from the store.
    NotFound(i64),
    /// A dependency referenced a local id that does not exist (any more).
    DependencyNotFound(i64),
    /// Resubmit refused because the job is not in a terminal state.
    NotResubmittable { id: i64, state: JobState },
    InvalidCommand(String),
    /// Delete left something behind; log and record failures are reported
    /// separately because one can succeed while the other does not.
    DeleteFailed {
        id: i64,
        log_error: Option<std::io::Error>,
        store_error: Option<StoreError>,
    },
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Submit(err) => write!(f, "{err}"),
            Self::Cancel { id, source } => write!(f, "failed to stop job {id}: {source}"),
            Self::Io(err) => write!(f, "io: {err}"),
            Self::NotFound(id) => write!(f, "job {id} not found"),
            Self::DependencyNotFound(id) => {
                write!(f, "dependency job {id} not found in this job list")
            }
            Self::NotResubmittable { id, state } => {
                write!(f, "job {id} is {state} and cannot be resubmitted")
            }
            Self::InvalidCommand(message) => write!(f, "{message}"),
            Self::DeleteFailed {
                id,
                log_error,
                store_error,
            } => {
                write!(f, "failed to delete job {id}:")?;
                if let Some(err) = log_error {
                    write!(f, " log file: {err};")?;
                }
                if let Some(err) = store_error {
                    write!(f, " record: {err};")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ManagerError {}

impl From<StoreError> for ManagerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<std::io::Error> for ManagerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// One submit request; `repeat > 1` submits a linear chain where each job
/// depends on the local id of the one before it.
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub name: Option<String>,
    /// Scheduler flags plus either a script path or an inline `---` command.
    pub command: Vec<String>,
    /// Dependency expression over local ids.
    pub dependency_spec: Option<String>,
    /// sbatch array specification, e.g. `0-15:4` or `0,3,7%2`.
    pub array: Option<String>,
    pub repeat: u32,
}

pub struct JobManager<S: Scheduler> {
    store: SqliteStore,
    scheduler: S,
    logs_dir: PathBuf,
}

impl<S: Scheduler> JobManager<S> {
    pub fn new(store: SqliteStore, scheduler: S, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scheduler,
            logs_dir: logs_dir.into(),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Submit one job, or a chain of `repeat` jobs. Each accepted job gets
    /// the next local id; nothing is persisted for a rejected submission.
    pub fn submit(&mut self, request: &SubmitRequest) -> Result<Vec<JobRow>, ManagerError> {
        let name = request
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| TOOL_NAME.to_string());
        let repeat = request.repeat.max(1);
        let mut rows = Vec::with_capacity(repeat as usize);
        let mut dependency_spec = request.dependency_spec.clone();
        for _ in 0..repeat {
            let row = self.submit_one(
                &name,
                &request.command,
                dependency_spec.as_deref(),
                request.array.as_deref(),
            )?;
            dependency_spec = Some(row.id.to_string());
            rows.push(row);
        }
        Ok(rows)
    }

    fn submit_one(
        &mut self,
        name: &str,
        command: &[String],
        dependency_spec: Option<&str>,
        array: Option<&str>,
    ) -> Result<JobRow, ManagerError> {
        let has_inline = command.iter().any(|arg| arg == INLINE_SEPARATOR);
        if has_inline && command.iter().any(|arg| arg.starts_with("--wrap")) {
            return Err(ManagerError::InvalidCommand(
                "cannot use --wrap and --- together".to_string(),
            ));
        }
        // Dependencies are checked before anything reaches the scheduler.
        let resolved_spec = match dependency_spec {
            Some(spec) => Some(self.resolve_dependency_spec(spec)?),
            None => None,
        };
        // The array flag becomes part of the stored command, so resubmission
        // replays it without special handling; the expanded index list is
        // kept alongside to resolve per-task log files.
        let array_task_ids = match array {
            Some(spec) => Some(
                parse_array_indexes(spec)
                    .map_err(|err| ManagerError::InvalidCommand(err.to_string()))?,
            ),
            None => None,
        };
        let command: Vec<String> = match array {
            Some(spec) => ["--array".to_string(), spec.to_string()]
                .into_iter()
                .chain(command.iter().cloned())
                .collect(),
            None => command.to_vec(),
        };
        std::fs::create_dir_all(&self.logs_dir)?;

        let script_content = script::inline_script(&command);
        let output_template =
            output_template_for(&self.logs_dir, name, array_task_ids.is_some());
        let (argv, script) = build_submit_argv(
            name,
            &output_template,
            &command,
            resolved_spec.as_deref(),
            script_content.as_deref(),
        )?;
        let slurm_id = self.scheduler.submit(&argv).map_err(ManagerError::Submit)?;
        // The guard removes the temporary script on every exit path; the
        // record below carries the durable copy of its content.
        drop(script);

        let new_job = NewJob {
            name: name.to_string(),
            command,
            submitted_command: argv,
            script_content,
            logs_dir: self.logs_dir.clone(),
            dependency_spec: dependency_spec.map(str::to_string),
            array_task_ids,
            slurm_id,
        };
        Ok(self.store.insert_job(&new_job)?)
    }

    /// Rewrite a dependency expression from local ids to the referenced
    /// jobs' *current* scheduler ids.
    fn resolve_dependency_spec(&self, spec: &str) -> Result<String, ManagerError> {
        let local_ids = job_ids_from_spec(spec);
        let mut slurm_ids = Vec::with_capacity(local_ids.len());
        for id in local_ids {
            let row = self
                .store
                .get_job(id)?
                .ok_or(ManagerError::DependencyNotFound(id))?;
            let slurm_id = row.slurm_id.ok_or(ManagerError::DependencyNotFound(id))?;
            slurm_ids.push(slurm_id);
        }
        replace_job_ids_in_spec(spec, &slurm_ids).map_err(|err| {
            ManagerError::InvalidCommand(format!("bad dependency expression {spec}: {err}"))
        })
    }

    /// Load and refresh the rows matching the filter. State filters apply
    /// to the refreshed state, so a job the scheduler just finished matches
    /// terminal-state selections immediately.
    pub fn list(
        &mut self,
        filter: &JobFilter,
        dependents: bool,
        force_refresh: bool,
    ) -> Result<Vec<RefreshedJob>, ManagerError> {
        self.select(filter, dependents, force_refresh)
    }

    fn select(
        &mut self,
        filter: &JobFilter,
        dependents: bool,
        force_refresh: bool,
    ) -> Result<Vec<RefreshedJob>, ManagerError> {
        for id in &filter.ids {
            if self.store.get_job(*id)?.is_none() {
                return Err(ManagerError::NotFound(*id));
            }
        }
        let base = JobFilter {
            ids: filter.ids.clone(),
            names: filter.names.clone(),
            states: Vec::new(),
        };
        let rows = self.store.list_jobs(&base)?;
        let mut jobs =
            sync::refresh_jobs(&mut self.store, &self.scheduler, rows, force_refresh)?;
        if !filter.states.is_empty() {
            jobs.retain(|job| filter.states.contains(&job.row.state));
        }
        if dependents {
            let matched: Vec<i64> = jobs.iter().map(|job| job.row.id).collect();
            let expanded = self.store.with_transitive_dependents(&matched)?;
            let extra_ids: Vec<i64> = expanded
                .into_iter()
                .filter(|id| !matched.contains(id))
                .collect();
            if !extra_ids.is_empty() {
                let extra_rows = self.store.list_jobs(&JobFilter {
                    ids: extra_ids,
                    ..Default::default()
                })?;
                let extras = sync::refresh_jobs(
                    &mut self.store,
                    &self.scheduler,
                    extra_rows,
                    force_refresh,
                )?;
                jobs.extend(extras);
                jobs.sort_by_key(|job| job.row.id);
            }
        }
        Ok(jobs)
    }

    /// Cancel the selected jobs with the scheduler. The cached state is not
    /// touched; the next refresh re-derives it, which avoids racing the
    /// scheduler's own cancel processing.
    pub fn stop(
        &mut self,
        filter: &JobFilter,
        dependents: bool,
    ) -> Result<Vec<JobRow>, ManagerError> {
        let selected = self.select(filter, dependents, false)?;
        let mut rows = Vec::with_capacity(selected.len());
        for job in selected {
            if let Some(slurm_id) = job.row.slurm_id {
                self.scheduler
                    .cancel(slurm_id)
                    .map_err(|source| ManagerError::Cancel {
                        id: job.row.id,
                        source,
                    })?;
            }
            rows.push(job.row);
        }
        Ok(rows)
    }

    /// Resubmit terminal jobs under a fresh scheduler id. Local id and
    /// dependency list stay as they are; dependency ids are re-resolved to
    /// the prerequisites' current scheduler ids, and inline scripts are
    /// re-materialized from the stored content. With no selection at all the
    /// failed set is targeted, so finished work is never re-run by accident.
    pub fn resubmit(
        &mut self,
        filter: &JobFilter,
        dependents: bool,
    ) -> Result<Vec<JobRow>, ManagerError> {
        let mut effective = filter.clone();
        if effective.is_empty() {
            effective.states = JobState::FAILED_STATES.to_vec();
        }
        let selected = self.select(&effective, dependents, false)?;
        let mut rows = Vec::with_capacity(selected.len());
        for job in selected {
            let row = job.row;
            if !row.state.is_terminal() {
                return Err(ManagerError::NotResubmittable {
                    id: row.id,
                    state: row.state,
                });
            }
            let resolved_spec = match row.dependency_spec.as_deref() {
                Some(spec) => Some(self.resolve_dependency_spec(spec)?),
                None => None,
            };
            // The previous attempt's log files would be orphaned once the
            // scheduler id changes; drop them now.
            if let Some(err) = self.remove_log_files(&row) {
                return Err(ManagerError::Io(err));
            }
            std::fs::create_dir_all(&row.logs_dir)?;
            let (argv, script) = build_submit_argv(
                &row.name,
                &row.output_template(),
                &row.command,
                resolved_spec.as_deref(),
                row.script_content.as_deref(),
            )?;
            let slurm_id = self.scheduler.submit(&argv).map_err(ManagerError::Submit)?;
            drop(script);
            self.store.record_submission(row.id, slurm_id, &argv)?;
            let updated = self
                .store
                .get_job(row.id)?
                .ok_or(ManagerError::NotFound(row.id))?;
            rows.push(updated);
        }
        Ok(rows)
    }

    /// Remove the selected jobs: best-effort cancel while possibly active,
    /// then the log file, then the record. Log and record failures are
    /// both surfaced; a read-only store still gets its log files cleaned.
    pub fn delete(
        &mut self,
        filter: &JobFilter,
        dependents: bool,
    ) -> Result<Vec<JobRow>, ManagerError> {
        let selected = self.select(filter, dependents, false)?;
        let mut rows = Vec::with_capacity(selected.len());
        for job in selected {
            let row = job.row;
            if !row.state.is_terminal()
                && let Some(slurm_id) = row.slurm_id
            {
                // The scheduler having already forgotten the id is not an
                // obstacle to deleting the local record.
                let _ = self.scheduler.cancel(slurm_id);
            }
            let log_error = self.remove_log_files(&row);
            let store_error = match self.store.delete_job(row.id) {
                Ok(_) => None,
                Err(err) => Some(err),
            };
            if log_error.is_some() || store_error.is_some() {
                return Err(ManagerError::DeleteFailed {
                    id: row.id,
                    log_error,
                    store_error,
                });
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn remove_log_files(&self, row: &JobRow) -> Option<std::io::Error> {
        let others = self.store.list_jobs(&JobFilter::default()).unwrap_or_default();
        for path in row.output_files() {
            // Keep a file while any other record still resolves to it.
            let shared = others
                .iter()
                .any(|other| other.id != row.id && other.output_files().contains(&path));
            if shared {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Some(err),
            }
        }
        None
    }
}

/// Build the full submission argv: injected name and log paths first, then
/// the rewritten dependency flag, then the user's own flags and script (or
/// the materialized inline script). The returned guard keeps the temporary
/// script alive until the scheduler has read it.
fn build_submit_argv(
    name: &str,
    output_template: &Path,
    command: &[String],
    dependency_spec: Option<&str>,
    script_content: Option<&str>,
) -> Result<(Vec<String>, Option<TempScript>), ManagerError> {
    let output = output_template.to_string_lossy().into_owned();
    let mut argv = vec![
        SBATCH_BIN.to_string(),
        "--job-name".to_string(),
        name.to_string(),
        "--output".to_string(),
        output.clone(),
        "--error".to_string(),
        output,
    ];
    if let Some(spec) = dependency_spec {
        argv.push("--dependency".to_string());
        argv.push(spec.to_string());
    }
    let script = match command.iter().position(|arg| arg == INLINE_SEPARATOR) {
        Some(split_idx) => {
            let content = script_content.ok_or_else(|| {
                ManagerError::InvalidCommand("inline submission without script content".to_string())
            })?;
            let script = TempScript::create(content)?;
            argv.extend(command[..split_idx].iter().cloned());
            argv.push(script.path().to_string_lossy().into_owned());
            Some(script)
        }
        None => {
            argv.extend(command.iter().cloned());
            None
        }
    };
    Ok((argv, script))
}
