//! End-to-end lifecycle coverage against a scripted scheduler stub.

use gq_core::state::JobState;
use gq_manager::{JobManager, ManagerError, SubmitRequest};
use gq_slurm::{CancelError, JobStatus, QueryError, Scheduler, SubmitError};
use gq_storage::{JobFilter, SqliteStore};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Default)]
struct StubState {
    next_ids: Vec<i64>,
    submissions: Vec<Vec<String>>,
    live: HashMap<i64, JobStatus>,
    history: HashMap<i64, JobStatus>,
    detail: HashMap<i64, JobStatus>,
    history_unavailable: bool,
    cancelled: Vec<i64>,
}

/// Scheduler double with scripted answers. Cloned handles share one state,
/// so tests keep a handle after moving the other into the manager.
#[derive(Clone, Default)]
struct StubScheduler {
    state: Rc<RefCell<StubState>>,
}

impl StubScheduler {
    fn with_ids(ids: &[i64]) -> Self {
        let stub = Self::default();
        stub.state.borrow_mut().next_ids = ids.to_vec();
        stub
    }

    fn status(state: JobState, exit_code: Option<i64>) -> JobStatus {
        JobStatus {
            state,
            exit_code,
            nodes: Some("node001".to_string()),
        }
    }

    fn set_live(&self, id: i64, state: JobState) {
        self.state
            .borrow_mut()
            .live
            .insert(id, Self::status(state, None));
    }

    fn clear_live(&self, id: i64) {
        self.state.borrow_mut().live.remove(&id);
    }

    fn set_history(&self, id: i64, state: JobState, exit_code: i64) {
        self.state
            .borrow_mut()
            .history
            .insert(id, Self::status(state, Some(exit_code)));
    }

    fn set_detail(&self, id: i64, state: JobState, exit_code: i64) {
        self.state
            .borrow_mut()
            .detail
            .insert(id, Self::status(state, Some(exit_code)));
    }

    fn disable_history(&self) {
        self.state.borrow_mut().history_unavailable = true;
    }

    fn submissions(&self) -> Vec<Vec<String>> {
        self.state.borrow().submissions.clone()
    }

    fn cancelled(&self) -> Vec<i64> {
        self.state.borrow().cancelled.clone()
    }
}

impl Scheduler for StubScheduler {
    fn submit(&self, argv: &[String]) -> Result<i64, SubmitError> {
        let mut state = self.state.borrow_mut();
        state.submissions.push(argv.to_vec());
        if state.next_ids.is_empty() {
            return Err(SubmitError::Invalid("stub ran out of scripted ids"));
        }
        Ok(state.next_ids.remove(0))
    }

    fn query_live(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError> {
        let state = self.state.borrow();
        Ok(ids
            .iter()
            .filter_map(|id| state.live.get(id).map(|status| (*id, status.clone())))
            .collect())
    }

    fn query_history(&self, ids: &[i64]) -> Result<HashMap<i64, JobStatus>, QueryError> {
        let state = self.state.borrow();
        if state.history_unavailable {
            return Err(QueryError::Unavailable("accounting disabled".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.history.get(id).map(|status| (*id, status.clone())))
            .collect())
    }

    fn query_detail(&self, id: i64) -> Result<Option<JobStatus>, QueryError> {
        Ok(self.state.borrow().detail.get(&id).cloned())
    }

    fn cancel(&self, id: i64) -> Result<(), CancelError> {
        self.state.borrow_mut().cancelled.push(id);
        Ok(())
    }
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{nonce}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn manager_in(dir: &PathBuf, scheduler: StubScheduler) -> JobManager<StubScheduler> {
    let store = SqliteStore::open(dir.join("gridq.db")).expect("open store");
    JobManager::new(store, scheduler, dir.join("logs"))
}

fn script_request(command: &[&str]) -> SubmitRequest {
    SubmitRequest {
        name: None,
        command: command.iter().map(|arg| arg.to_string()).collect(),
        dependency_spec: None,
        array: None,
        repeat: 1,
    }
}

fn ids(filter_ids: &[i64]) -> JobFilter {
    JobFilter {
        ids: filter_ids.to_vec(),
        ..Default::default()
    }
}

#[test]
fn local_ids_increase_and_are_never_reused() {
    let dir = temp_dir("gq_mgr_ids");
    let stub = StubScheduler::with_ids(&[100, 101, 102, 103]);
    let mut manager = manager_in(&dir, stub.clone());

    for _ in 0..3 {
        manager.submit(&script_request(&["job.sh"])).expect("submit");
    }
    manager.delete(&ids(&[2]), false).expect("delete");
    let rows = manager.submit(&script_request(&["job.sh"])).expect("submit");
    assert_eq!(rows[0].id, 4, "deleted local ids must not come back");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn repeat_builds_a_linear_chain_on_local_ids() {
    let dir = temp_dir("gq_mgr_repeat");
    let stub = StubScheduler::with_ids(&[100, 101, 102]);
    let mut manager = manager_in(&dir, stub.clone());

    let mut request = script_request(&["job.sh"]);
    request.repeat = 3;
    let rows = manager.submit(&request).expect("submit chain");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].dependency_spec, None);
    assert_eq!(rows[1].dependency_spec.as_deref(), Some("1"));
    assert_eq!(rows[2].dependency_spec.as_deref(), Some("2"));

    // Each chained submission names the previous job's scheduler id.
    let submissions = stub.submissions();
    assert!(!submissions[0].contains(&"--dependency".to_string()));
    assert!(submissions[1].windows(2).any(|w| w == ["--dependency", "100"]));
    assert!(submissions[2].windows(2).any(|w| w == ["--dependency", "101"]));

    let dependents = manager
        .store()
        .with_transitive_dependents(&[1])
        .expect("walk");
    assert_eq!(dependents, vec![1, 2, 3]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn dependency_expressions_are_rewritten_to_scheduler_ids() {
    let dir = temp_dir("gq_mgr_deps");
    let stub = StubScheduler::with_ids(&[100, 101]);
    let mut manager = manager_in(&dir, stub.clone());

    manager.submit(&script_request(&["first.sh"])).expect("submit a");
    let mut request = script_request(&["second.sh"]);
    request.dependency_spec = Some("afterok:1+5".to_string());
    let rows = manager.submit(&request).expect("submit b");

    // The record keeps local ids; only the scheduler sees its own ids.
    assert_eq!(rows[0].dependency_spec.as_deref(), Some("afterok:1+5"));
    let submissions = stub.submissions();
    assert!(submissions[1].windows(2).any(|w| w == ["--dependency", "afterok:100+5"]));

    let mut missing = script_request(&["third.sh"]);
    missing.dependency_spec = Some("afterok:9".to_string());
    match manager.submit(&missing) {
        Err(ManagerError::DependencyNotFound(9)) => {}
        other => panic!("expected DependencyNotFound, got {other:?}"),
    }
    // The rejected submission must not have reached the scheduler.
    assert_eq!(stub.submissions().len(), 2);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn resubmit_requires_a_terminal_state() {
    let dir = temp_dir("gq_mgr_resubmit_guard");
    let stub = StubScheduler::with_ids(&[100, 200]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");

    stub.set_live(100, JobState::Running);
    match manager.resubmit(&ids(&[1]), false) {
        Err(ManagerError::NotResubmittable {
            id: 1,
            state: JobState::Running,
        }) => {}
        other => panic!("expected NotResubmittable, got {other:?}"),
    }
    let row = manager.store().get_job(1).expect("get").expect("present");
    assert_eq!(row.slurm_id, Some(100), "refused resubmit must not mutate");

    stub.clear_live(100);
    stub.set_history(100, JobState::Failed, 1);
    let rows = manager.resubmit(&ids(&[1]), false).expect("resubmit");
    assert_eq!(rows[0].id, 1, "local id survives resubmission");
    assert_eq!(rows[0].slurm_id, Some(200));
    assert_eq!(rows[0].state, JobState::Pending);
    assert_eq!(rows[0].exit_code, None);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn resubmit_with_no_selection_targets_only_failed_jobs() {
    let dir = temp_dir("gq_mgr_resubmit_default");
    let stub = StubScheduler::with_ids(&[100, 101, 200]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["done.sh"])).expect("submit a");
    manager.submit(&script_request(&["broken.sh"])).expect("submit b");
    stub.set_history(100, JobState::Completed, 0);
    stub.set_history(101, JobState::Failed, 1);

    let rows = manager.resubmit(&JobFilter::default(), false).expect("resubmit");
    assert_eq!(rows.len(), 1, "finished work must not be re-run");
    assert_eq!(rows[0].id, 2);
    assert_eq!(rows[0].slurm_id, Some(200));

    let completed = manager.store().get_job(1).expect("get").expect("present");
    assert_eq!(completed.slurm_id, Some(100));
    assert_eq!(completed.state, JobState::Completed);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn resubmit_removes_the_previous_attempts_log_file() {
    let dir = temp_dir("gq_mgr_resubmit_logs");
    let stub = StubScheduler::with_ids(&[100, 200]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");
    stub.set_history(100, JobState::Failed, 1);

    let old_log = dir.join("logs").join("gridq.100.out");
    fs::write(&old_log, "stale output\n").expect("write log");

    let rows = manager.resubmit(&ids(&[1]), false).expect("resubmit");
    assert_eq!(rows[0].slurm_id, Some(200));
    assert!(!old_log.exists(), "old attempt's log must not be orphaned");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn stop_cancels_but_leaves_state_to_the_scheduler() {
    let dir = temp_dir("gq_mgr_stop");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");
    stub.set_live(100, JobState::Running);

    manager.stop(&ids(&[1]), false).expect("stop");
    assert_eq!(stub.cancelled(), vec![100]);
    let row = manager.store().get_job(1).expect("get").expect("present");
    assert_eq!(row.state, JobState::Running, "stop must not guess CANCELLED");

    // The cancelled state arrives through the normal refresh path.
    stub.clear_live(100);
    stub.set_history(100, JobState::Cancelled, 0);
    let listed = manager.list(&ids(&[1]), false, false).expect("list");
    assert_eq!(listed[0].row.state, JobState::Cancelled);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn stop_with_dependents_reaches_the_whole_subtree() {
    let dir = temp_dir("gq_mgr_dependents");
    let stub = StubScheduler::with_ids(&[100, 101, 102]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["a.sh"])).expect("a");
    let mut b = script_request(&["b.sh"]);
    b.dependency_spec = Some("afterok:1".to_string());
    manager.submit(&b).expect("b");
    let mut c = script_request(&["c.sh"]);
    c.dependency_spec = Some("2".to_string());
    manager.submit(&c).expect("c");

    let rows = manager.stop(&ids(&[1]), true).expect("stop subtree");
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(stub.cancelled(), vec![100, 101, 102]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_explicit_ids_are_rejected() {
    let dir = temp_dir("gq_mgr_unknown_id");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");

    match manager.delete(&ids(&[42]), false) {
        Err(ManagerError::NotFound(42)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(
        manager.store().list_jobs(&JobFilter::default()).expect("list").len(),
        1,
        "a rejected selection must not delete anything"
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn delete_removes_record_and_log_file() {
    let dir = temp_dir("gq_mgr_delete");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");
    stub.set_history(100, JobState::Completed, 0);

    let log_path = dir.join("logs").join("gridq.100.out");
    fs::write(&log_path, "output\n").expect("write log");

    manager.delete(&ids(&[1]), false).expect("delete");
    assert!(manager.store().get_job(1).expect("get").is_none());
    assert!(!log_path.exists(), "log file goes with the record");
    assert!(
        stub.cancelled().is_empty(),
        "a completed job must not be cancelled on delete"
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_accounting_falls_back_to_detail_queries() {
    let dir = temp_dir("gq_mgr_detail_fallback");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");
    stub.disable_history();
    stub.set_detail(100, JobState::Completed, 0);

    let listed = manager.list(&JobFilter::default(), false, false).expect("list");
    assert!(listed[0].fresh);
    assert_eq!(listed[0].row.state, JobState::Completed);
    assert_eq!(listed[0].row.exit_code, Some(0));
    assert_eq!(listed[0].state_label(), "COMPLETED (0)");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn vanished_jobs_render_unknown_without_losing_the_record() {
    let dir = temp_dir("gq_mgr_unknown_state");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");

    // No backend knows the id: the listing succeeds, flags the row, and
    // keeps the last cached state in the store.
    let listed = manager.list(&JobFilter::default(), false, false).expect("list");
    assert!(!listed[0].fresh);
    assert!(listed[0].note.as_deref().unwrap_or("").contains("100"));
    assert_eq!(listed[0].state_label(), "UNKNOWN");
    let row = manager.store().get_job(1).expect("get").expect("present");
    assert_eq!(row.state, JobState::Pending);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn terminal_states_are_not_requeried_unless_forced() {
    let dir = temp_dir("gq_mgr_terminal_cache");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["job.sh"])).expect("submit");
    stub.set_history(100, JobState::Completed, 0);
    manager.list(&JobFilter::default(), false, false).expect("first list");

    // Later scheduler answers are ignored for a settled job.
    stub.set_history(100, JobState::Failed, 1);
    let listed = manager.list(&JobFilter::default(), false, false).expect("second list");
    assert_eq!(listed[0].row.state, JobState::Completed);

    let forced = manager.list(&JobFilter::default(), false, true).expect("forced list");
    assert_eq!(forced[0].row.state, JobState::Failed);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn inline_submission_persists_script_and_removes_temp_file() {
    let dir = temp_dir("gq_mgr_inline");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());

    let rows = manager
        .submit(&script_request(&["--mem", "4G", "---", "python", "train.py"]))
        .expect("submit inline");
    assert_eq!(
        rows[0].script_content.as_deref(),
        Some("#!/bin/bash\npython train.py\n")
    );

    let argv = stub.submissions().remove(0);
    assert_eq!(argv[0], "sbatch");
    assert_eq!(argv[1], "--job-name");
    assert_eq!(argv[2], "gridq");
    assert!(argv.contains(&"--mem".to_string()));
    assert!(!argv.contains(&"---".to_string()));
    assert!(!argv.contains(&"python".to_string()));
    let script_path = PathBuf::from(argv.last().expect("script arg"));
    assert!(script_path.to_string_lossy().ends_with(".sh"));
    assert!(!script_path.exists(), "temp script is gone after submission");

    // The stored argv matches what the scheduler actually received.
    assert_eq!(rows[0].submitted_command, argv);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn array_submission_expands_tasks_and_their_log_files() {
    let dir = temp_dir("gq_mgr_array");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());

    let mut request = script_request(&["job.sh"]);
    request.array = Some("0-2".to_string());
    let rows = manager.submit(&request).expect("submit array");
    let row = &rows[0];
    assert_eq!(row.array_task_ids, Some(vec![0, 1, 2]));
    // The flag is part of the stored command, so resubmission replays it.
    assert!(row.command.windows(2).any(|w| w == ["--array", "0-2"]));

    let argv = stub.submissions().remove(0);
    assert!(argv.windows(2).any(|w| w == ["--array", "0-2"]));
    let output = argv
        .windows(2)
        .find(|w| w[0] == "--output")
        .map(|w| w[1].clone())
        .expect("output flag");
    assert!(output.ends_with("gridq.%A-%a.out"), "got {output}");

    let logs = dir.join("logs");
    let expected: Vec<PathBuf> = [0, 1, 2]
        .iter()
        .map(|task| logs.join(format!("gridq.100-{task}.out")))
        .collect();
    assert_eq!(row.output_files(), expected);

    // Delete cleans up every task's log.
    stub.set_history(100, JobState::Completed, 0);
    for path in &expected {
        fs::write(path, "task output\n").expect("write log");
    }
    manager.delete(&ids(&[1]), false).expect("delete");
    for path in &expected {
        assert!(!path.exists(), "task log {} survived delete", path.display());
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_array_specifications_are_rejected_before_submission() {
    let dir = temp_dir("gq_mgr_array_invalid");
    let stub = StubScheduler::with_ids(&[100]);
    let mut manager = manager_in(&dir, stub.clone());

    let mut request = script_request(&["job.sh"]);
    request.array = Some("a-b".to_string());
    match manager.submit(&request) {
        Err(ManagerError::InvalidCommand(_)) => {}
        other => panic!("expected InvalidCommand, got {other:?}"),
    }
    assert!(stub.submissions().is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn state_filters_apply_to_refreshed_states() {
    let dir = temp_dir("gq_mgr_state_filter");
    let stub = StubScheduler::with_ids(&[100, 101]);
    let mut manager = manager_in(&dir, stub.clone());
    manager.submit(&script_request(&["a.sh"])).expect("a");
    manager.submit(&script_request(&["b.sh"])).expect("b");
    stub.set_live(100, JobState::Running);
    stub.set_history(101, JobState::Failed, 1);

    let failed = manager
        .list(
            &JobFilter {
                states: vec![JobState::Failed],
                ..Default::default()
            },
            false,
            false,
        )
        .expect("list failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].row.id, 2);
    let _ = fs::remove_dir_all(&dir);
}
