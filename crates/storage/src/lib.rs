#![forbid(unsafe_code)]

//! Per-directory job record store.
//!
//! One SQLite database per working directory holds every locally known job:
//! the local-id to scheduler-id mapping, submission provenance (the exact
//! argv, inline script content, log location) and the last observed state.
//! Local ids come from SQLite AUTOINCREMENT, so they are strictly increasing
//! and never reused, even after deletes.

use gq_core::deps::job_ids_from_spec;
use gq_core::state::JobState;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    /// The database could only be opened read-only; listing works, mutation
    /// does not.
    ReadOnly,
    InvalidInput(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::ReadOnly => write!(f, "job database is read-only"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// One row of the `jobs` table.
#[derive(Clone, Debug)]
pub struct JobRow {
    pub id: i64,
    pub name: String,
    /// User-supplied argument vector, verbatim (scheduler flags plus either
    /// a script path or the inline `---` command form).
    pub command: Vec<String>,
    /// Exact argv of the last scheduler invocation, including any generated
    /// temporary script path.
    pub submitted_command: Vec<String>,
    /// Present only for inline submissions; the temporary script is removed
    /// after submission and this is the durable copy.
    pub script_content: Option<String>,
    pub logs_dir: PathBuf,
    /// Dependency expression with local job ids, e.g. `afterok:3:4`.
    pub dependency_spec: Option<String>,
    /// Task indexes for an array submission; `None` for plain jobs.
    pub array_task_ids: Option<Vec<i64>>,
    pub slurm_id: Option<i64>,
    pub state: JobState,
    pub exit_code: Option<i64>,
    pub nodes: Option<String>,
}

impl JobRow {
    pub fn is_array_job(&self) -> bool {
        self.array_task_ids.is_some()
    }

    pub fn output_template(&self) -> PathBuf {
        output_template_for(&self.logs_dir, &self.name, self.is_array_job())
    }

    /// Templates resolved with the current scheduler id, one path per array
    /// task. Empty while no scheduler id is known.
    pub fn output_files(&self) -> Vec<PathBuf> {
        let Some(slurm_id) = self.slurm_id else {
            return Vec::new();
        };
        let template = self.output_template().to_string_lossy().into_owned();
        match &self.array_task_ids {
            Some(task_ids) => task_ids
                .iter()
                .map(|task| {
                    PathBuf::from(
                        template
                            .replace("%A", &slurm_id.to_string())
                            .replace("%a", &task.to_string()),
                    )
                })
                .collect(),
            None => vec![PathBuf::from(template.replace("%j", &slurm_id.to_string()))],
        }
    }

    /// Local ids referenced by the dependency expression, in order.
    pub fn dependency_ids(&self) -> Vec<i64> {
        self.dependency_spec
            .as_deref()
            .map(job_ids_from_spec)
            .unwrap_or_default()
    }
}

/// Log path template handed to the scheduler. `%j` is the scheduler's
/// job-id placeholder; array jobs use `%A` (master id) and `%a` (task id)
/// instead.
pub fn output_template_for(logs_dir: &Path, name: &str, is_array: bool) -> PathBuf {
    if is_array {
        logs_dir.join(format!("{name}.%A-%a.out"))
    } else {
        logs_dir.join(format!("{name}.%j.out"))
    }
}

/// Fields needed to persist a freshly accepted submission.
#[derive(Clone, Debug)]
pub struct NewJob {
    pub name: String,
    pub command: Vec<String>,
    pub submitted_command: Vec<String>,
    pub script_content: Option<String>,
    pub logs_dir: PathBuf,
    pub dependency_spec: Option<String>,
    pub array_task_ids: Option<Vec<i64>>,
    pub slurm_id: i64,
}

/// Row selection for list-style operations. Empty vectors mean "no filter".
#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    pub ids: Vec<i64>,
    pub names: Vec<String>,
    pub states: Vec<JobState>,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty() && self.states.is_empty()
    }

    fn matches(&self, row: &JobRow) -> bool {
        (self.ids.is_empty() || self.ids.contains(&row.id))
            && (self.names.is_empty() || self.names.contains(&row.name))
            && (self.states.is_empty() || self.states.contains(&row.state))
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    db_path: PathBuf,
    conn: Connection,
    read_only: bool,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `db_path`. Falls back to a
    /// read-only handle when the database or its directory is not writable,
    /// so listing still works in degraded mode.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        match Connection::open(&db_path) {
            Ok(conn) => {
                let store = Self {
                    db_path,
                    conn,
                    read_only: false,
                };
                match store.migrate() {
                    Ok(()) => Ok(store),
                    // A writable open of a db on a read-only filesystem only
                    // fails once we issue the first write.
                    Err(StoreError::Sql(_)) => Self::open_read_only(store.db_path),
                    Err(err) => Err(err),
                }
            }
            Err(_) => Self::open_read_only(db_path),
        }
    }

    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            db_path,
            conn,
            read_only: true,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS meta (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              command_json TEXT NOT NULL,
              submitted_json TEXT NOT NULL,
              script_content TEXT,
              logs_dir TEXT NOT NULL,
              dependency_spec TEXT,
              array_json TEXT,
              slurm_id INTEGER,
              state TEXT NOT NULL DEFAULT 'UNKNOWN',
              exit_code INTEGER,
              nodes TEXT
            );

            CREATE TABLE IF NOT EXISTS job_dependencies (
              job_id INTEGER NOT NULL REFERENCES jobs(id),
              waited_for_job_id INTEGER NOT NULL REFERENCES jobs(id),
              PRIMARY KEY (job_id, waited_for_job_id)
            );
            "#,
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params!["schema_version", "v1"],
        )?;
        Ok(())
    }

    fn require_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    /// Persist a new job and its dependency edges in one transaction,
    /// returning the allocated local id.
    pub fn insert_job(&mut self, new_job: &NewJob) -> Result<JobRow, StoreError> {
        self.require_writable()?;
        let command_json = serde_json::to_string(&new_job.command)?;
        let submitted_json = serde_json::to_string(&new_job.submitted_command)?;
        let array_json = new_job
            .array_task_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let dep_ids = new_job
            .dependency_spec
            .as_deref()
            .map(job_ids_from_spec)
            .unwrap_or_default();

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO jobs(name, command_json, submitted_json, script_content,
                             logs_dir, dependency_spec, array_json, slurm_id, state)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                new_job.name,
                command_json,
                submitted_json,
                new_job.script_content,
                new_job.logs_dir.to_string_lossy(),
                new_job.dependency_spec,
                array_json,
                new_job.slurm_id,
                JobState::Pending.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        for dep_id in dep_ids {
            tx.execute(
                "INSERT OR IGNORE INTO job_dependencies(job_id, waited_for_job_id) VALUES (?1, ?2)",
                params![id, dep_id],
            )?;
        }
        tx.commit()?;

        self.get_job(id)?
            .ok_or(StoreError::InvalidInput("inserted row vanished"))
    }

    pub fn get_job(&self, id: i64) -> Result<Option<JobRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, name, command_json, submitted_json, script_content,
                       logs_dir, dependency_spec, array_json, slurm_id, state,
                       exit_code, nodes
                FROM jobs WHERE id = ?1
                "#,
                params![id],
                raw_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }

    /// All rows matching the filter, ordered by local id. Filtering happens
    /// in memory; a per-directory store stays small enough that avoiding
    /// dynamic SQL is the better trade.
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, command_json, submitted_json, script_content,
                   logs_dir, dependency_spec, array_json, slurm_id, state,
                   exit_code, nodes
            FROM jobs ORDER BY id ASC
            "#,
        )?;
        let raw = stmt
            .query_map([], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut rows = Vec::with_capacity(raw.len());
        for entry in raw {
            let row = decode_row(entry)?;
            if filter.matches(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Record a (re)submission: new scheduler id, new argv, cached state
    /// reset to PENDING with exit code and allocation cleared.
    pub fn record_submission(
        &mut self,
        id: i64,
        slurm_id: i64,
        submitted_command: &[String],
    ) -> Result<bool, StoreError> {
        self.require_writable()?;
        let submitted_json = serde_json::to_string(submitted_command)?;
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            r#"
            UPDATE jobs
            SET slurm_id = ?2, submitted_json = ?3, state = ?4,
                exit_code = NULL, nodes = NULL
            WHERE id = ?1
            "#,
            params![id, slurm_id, submitted_json, JobState::Pending.as_str()],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Persist refreshed observations in one transaction. Rows deleted by a
    /// concurrent process since enumeration are skipped.
    pub fn update_states(
        &mut self,
        updates: &[(i64, JobState, Option<i64>, Option<String>)],
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        let tx = self.conn.transaction()?;
        for (id, state, exit_code, nodes) in updates {
            tx.execute(
                "UPDATE jobs SET state = ?2, exit_code = ?3, nodes = ?4 WHERE id = ?1",
                params![id, state.as_str(), exit_code, nodes],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a job and its dependency edges (both directions). Returns
    /// false when the id was not present.
    pub fn delete_job(&mut self, id: i64) -> Result<bool, StoreError> {
        self.require_writable()?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM job_dependencies WHERE job_id = ?1 OR waited_for_job_id = ?1",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Local ids that directly depend on any of `ids`.
    pub fn direct_dependents(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let mut dependents = Vec::new();
        let mut stmt = self
            .conn
            .prepare("SELECT job_id FROM job_dependencies WHERE waited_for_job_id = ?1")?;
        for id in ids {
            let found = stmt
                .query_map(params![id], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for dep in found {
                if !dependents.contains(&dep) {
                    dependents.push(dep);
                }
            }
        }
        Ok(dependents)
    }

    /// `ids` expanded with every transitive dependent, sorted by local id.
    pub fn with_transitive_dependents(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let mut all: Vec<i64> = ids.to_vec();
        let mut frontier: Vec<i64> = ids.to_vec();
        while !frontier.is_empty() {
            let next = self.direct_dependents(&frontier)?;
            frontier = next.into_iter().filter(|id| !all.contains(id)).collect();
            all.extend(frontier.iter().copied());
        }
        all.sort_unstable();
        all.dedup();
        Ok(all)
    }
}

type RawRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    String,
    Option<i64>,
    Option<String>,
);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<JobRow, StoreError> {
    let (
        id,
        name,
        command_json,
        submitted_json,
        script_content,
        logs_dir,
        dependency_spec,
        array_json,
        slurm_id,
        state,
        exit_code,
        nodes,
    ) = raw;
    Ok(JobRow {
        id,
        name,
        command: serde_json::from_str(&command_json)?,
        submitted_command: serde_json::from_str(&submitted_json)?,
        script_content,
        logs_dir: PathBuf::from(logs_dir),
        dependency_spec,
        array_task_ids: array_json.as_deref().map(serde_json::from_str).transpose()?,
        slurm_id,
        state: JobState::from_token(&state),
        exit_code,
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(prefix: &str) -> PathBuf {
        let base = std::env::temp_dir();
        let pid = std::process::id();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = base.join(format!("{prefix}_{pid}_{nonce}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn sample_job(slurm_id: i64) -> NewJob {
        NewJob {
            name: "gridq".to_string(),
            command: vec!["--wrap".to_string(), "sleep".to_string()],
            submitted_command: vec![
                "sbatch".to_string(),
                "--job-name".to_string(),
                "gridq".to_string(),
            ],
            script_content: None,
            logs_dir: PathBuf::from("logs"),
            dependency_spec: None,
            array_task_ids: None,
            slurm_id,
        }
    }

    #[test]
    fn local_ids_start_at_one_and_increase() {
        let dir = temp_dir("gq_store_ids");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let a = store.insert_job(&sample_job(100)).expect("insert a");
        let b = store.insert_job(&sample_job(101)).expect("insert b");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.state, JobState::Pending);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let dir = temp_dir("gq_store_no_reuse");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let a = store.insert_job(&sample_job(100)).expect("insert a");
        let b = store.insert_job(&sample_job(101)).expect("insert b");
        assert!(store.delete_job(b.id).expect("delete b"));
        assert!(store.delete_job(a.id).expect("delete a"));
        let c = store.insert_job(&sample_job(102)).expect("insert c");
        assert_eq!(c.id, 3, "AUTOINCREMENT must not reuse deleted ids");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn command_vectors_round_trip() {
        let dir = temp_dir("gq_store_roundtrip");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let mut new_job = sample_job(7);
        new_job.command = vec![
            "--partition".to_string(),
            "gpu".to_string(),
            "---".to_string(),
            "python".to_string(),
            "train.py".to_string(),
        ];
        new_job.script_content = Some("#!/bin/bash\npython train.py\n".to_string());
        let row = store.insert_job(&new_job).expect("insert");
        let loaded = store.get_job(row.id).expect("get").expect("present");
        assert_eq!(loaded.command, new_job.command);
        assert_eq!(loaded.script_content, new_job.script_content);
        assert_eq!(loaded.slurm_id, Some(7));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dependency_edges_and_transitive_dependents() {
        let dir = temp_dir("gq_store_deps");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let a = store.insert_job(&sample_job(100)).expect("a");
        let mut with_dep = sample_job(101);
        with_dep.dependency_spec = Some(format!("afterok:{}", a.id));
        let b = store.insert_job(&with_dep).expect("b");
        let mut chained = sample_job(102);
        chained.dependency_spec = Some(b.id.to_string());
        let c = store.insert_job(&chained).expect("c");

        assert_eq!(b.dependency_ids(), vec![a.id]);
        assert_eq!(store.direct_dependents(&[a.id]).expect("direct"), vec![b.id]);
        assert_eq!(
            store.with_transitive_dependents(&[a.id]).expect("walk"),
            vec![a.id, b.id, c.id]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn record_submission_resets_cached_state() {
        let dir = temp_dir("gq_store_resubmit");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let row = store.insert_job(&sample_job(100)).expect("insert");
        store
            .update_states(&[(row.id, JobState::Failed, Some(1), Some("node001".to_string()))])
            .expect("update state");
        let failed = store.get_job(row.id).expect("get").expect("present");
        assert_eq!(failed.state, JobState::Failed);

        let new_argv = vec!["sbatch".to_string(), "again".to_string()];
        assert!(store.record_submission(row.id, 200, &new_argv).expect("resubmit"));
        let fresh = store.get_job(row.id).expect("get").expect("present");
        assert_eq!(fresh.slurm_id, Some(200));
        assert_eq!(fresh.state, JobState::Pending);
        assert_eq!(fresh.exit_code, None);
        assert_eq!(fresh.nodes, None);
        assert_eq!(fresh.submitted_command, new_argv);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn filters_select_by_id_name_and_state() {
        let dir = temp_dir("gq_store_filters");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let a = store.insert_job(&sample_job(100)).expect("a");
        let mut named = sample_job(101);
        named.name = "train".to_string();
        let b = store.insert_job(&named).expect("b");
        store
            .update_states(&[(b.id, JobState::Running, None, None)])
            .expect("update");

        let by_id = store
            .list_jobs(&JobFilter {
                ids: vec![a.id],
                ..Default::default()
            })
            .expect("by id");
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, a.id);

        let by_name = store
            .list_jobs(&JobFilter {
                names: vec!["train".to_string()],
                ..Default::default()
            })
            .expect("by name");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, b.id);

        let by_state = store
            .list_jobs(&JobFilter {
                states: vec![JobState::Running],
                ..Default::default()
            })
            .expect("by state");
        assert_eq!(by_state.len(), 1);
        assert_eq!(by_state[0].id, b.id);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_only_handle_lists_but_rejects_mutation() {
        let dir = temp_dir("gq_store_ro");
        let db_path = dir.join("gridq.db");
        {
            let mut store = SqliteStore::open(&db_path).expect("open rw");
            store.insert_job(&sample_job(100)).expect("insert");
        }
        let mut store = SqliteStore::open_read_only(&db_path).expect("open ro");
        assert!(store.is_read_only());
        let rows = store.list_jobs(&JobFilter::default()).expect("list");
        assert_eq!(rows.len(), 1);
        match store.delete_job(rows[0].id) {
            Err(StoreError::ReadOnly) => {}
            other => panic!("expected ReadOnly error, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    fn sample_row(slurm_id: Option<i64>) -> JobRow {
        JobRow {
            id: 1,
            name: "gridq".to_string(),
            command: Vec::new(),
            submitted_command: Vec::new(),
            script_content: None,
            logs_dir: PathBuf::from("logs"),
            dependency_spec: None,
            array_task_ids: None,
            slurm_id,
            state: JobState::Pending,
            exit_code: None,
            nodes: None,
        }
    }

    #[test]
    fn output_files_resolve_scheduler_id() {
        let row = sample_row(Some(123456));
        assert_eq!(row.output_template(), PathBuf::from("logs/gridq.%j.out"));
        assert_eq!(row.output_files(), vec![PathBuf::from("logs/gridq.123456.out")]);
        assert_eq!(sample_row(None).output_files(), Vec::<PathBuf>::new());
    }

    #[test]
    fn array_jobs_resolve_one_output_file_per_task() {
        let mut row = sample_row(Some(123456));
        row.array_task_ids = Some(vec![0, 4, 8]);
        assert_eq!(row.output_template(), PathBuf::from("logs/gridq.%A-%a.out"));
        assert_eq!(
            row.output_files(),
            vec![
                PathBuf::from("logs/gridq.123456-0.out"),
                PathBuf::from("logs/gridq.123456-4.out"),
                PathBuf::from("logs/gridq.123456-8.out"),
            ]
        );
    }

    #[test]
    fn array_task_ids_round_trip_through_the_database() {
        let dir = temp_dir("gq_store_array");
        let mut store = SqliteStore::open(dir.join("gridq.db")).expect("open");
        let mut new_job = sample_job(500);
        new_job.array_task_ids = Some(vec![0, 1, 2]);
        let row = store.insert_job(&new_job).expect("insert");
        let loaded = store.get_job(row.id).expect("get").expect("present");
        assert!(loaded.is_array_job());
        assert_eq!(loaded.array_task_ids, Some(vec![0, 1, 2]));

        let plain = store.insert_job(&sample_job(501)).expect("insert plain");
        let loaded = store.get_job(plain.id).expect("get").expect("present");
        assert!(!loaded.is_array_job());
        assert_eq!(loaded.array_task_ids, None);
        let _ = fs::remove_dir_all(&dir);
    }
}
