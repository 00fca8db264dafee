#![forbid(unsafe_code)]

mod table;

use gq_core::TOOL_NAME;
use gq_core::select::{parse_job_ids, parse_states};
use gq_manager::{JobManager, RefreshedJob, SubmitRequest};
use gq_slurm::{Scheduler, SlurmClient};
use gq_storage::{JobFilter, SqliteStore};
use std::path::PathBuf;

fn usage() -> &'static str {
    "gridq — job registry and convenience frontend for a SLURM cluster\n\n\
USAGE:\n\
  gridq [-d FILE] [-l DIR] <command> [options]\n\n\
COMMANDS:\n\
  submit (sbatch)      Submit a job; unknown options pass through to sbatch.\n\
                       `--- cmd args...` submits an inline command instead of\n\
                       a script file.\n\
  resubmit             Submit finished jobs again under the same local id.\n\
  stop                 Cancel jobs with the scheduler; records are kept.\n\
  list (ls)            Show the job table with refreshed states.\n\
  report               Show job details, script content and log output.\n\
  delete (rm, remove)  Remove records, their log files, and queued jobs.\n\n\
GLOBAL OPTIONS:\n\
  -d, --database FILE  Job database (default: gridq.db)\n\
  -l, --logs-dir DIR   Directory for job logs (default: logs)\n\
  -h, --help           Print this help and exit\n\
      --version        Print the version and exit\n\n\
SUBMIT OPTIONS:\n\
  -J, --job-name NAME  Job name (default: gridq); also names the log file\n\
  -D, --dependency SPEC  Dependency expression over local job ids,\n\
                       e.g. afterok:1:2 or plain `1`\n\
  -a, --array SPEC     Submit a job array, e.g. 0-15, 0-15:4 or 0,6,16-32%8\n\
      --repeat N       Submit N chained jobs, each depending on the previous\n\n\
SELECTION OPTIONS (list, report, stop, resubmit, delete):\n\
  -j, --jobs IDS       Local job ids: 1,3-5,7+2\n\
  -s, --states STATES  State filter, short or long tokens, or ALL\n\
  -n, --name NAME      Filter by job name (repeatable)\n\
      --dependents     Extend the selection with all transitive dependents\n\
      --refresh        Re-query finished jobs too\n\n\
  resubmit with no selection defaults to every failed job (BOOT_FAIL,\n\
  CANCELLED, FAILED, NODE_FAIL, OUT_OF_MEMORY, TIMEOUT).\n"
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(message) => {
            eprintln!("gridq: {message}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print!("{}", usage());
        return Ok(());
    }
    if args.iter().any(|arg| arg == "--version") {
        println!("{TOOL_NAME} {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut database = PathBuf::from("gridq.db");
    let mut logs_dir = PathBuf::from("logs");
    let mut i = 0usize;
    let command = loop {
        let Some(arg) = args.get(i) else {
            return Err("missing command; see --help".to_string());
        };
        match arg.as_str() {
            "-d" | "--database" => {
                i += 1;
                let value = args.get(i).ok_or("--database requires FILE")?;
                database = PathBuf::from(value);
            }
            "-l" | "--logs-dir" => {
                i += 1;
                let value = args.get(i).ok_or("--logs-dir requires DIR")?;
                logs_dir = PathBuf::from(value);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option {other}; see --help"));
            }
            other => break other.to_string(),
        }
        i += 1;
    };
    let rest = &args[i + 1..];

    // Reject bad commands before touching the database; a typo must not
    // leave an empty gridq.db behind.
    let known = matches!(
        command.as_str(),
        "submit" | "sbatch" | "resubmit" | "stop" | "list" | "ls" | "report" | "delete" | "rm"
            | "remove"
    );
    if !known {
        return Err(format!("unknown command {command}; see --help"));
    }

    let store = SqliteStore::open(&database).map_err(|err| err.to_string())?;
    let mut manager = JobManager::new(store, SlurmClient::new(), logs_dir);

    match command.as_str() {
        "submit" | "sbatch" => cmd_submit(&mut manager, rest),
        "resubmit" => cmd_resubmit(&mut manager, rest),
        "stop" => cmd_stop(&mut manager, rest),
        "list" | "ls" => cmd_list(&mut manager, rest),
        "report" => cmd_report(&mut manager, rest),
        "delete" | "rm" | "remove" => cmd_delete(&mut manager, rest),
        _ => unreachable!("command validated above"),
    }
}

fn cmd_submit<S: Scheduler>(
    manager: &mut JobManager<S>,
    args: &[String],
) -> Result<(), String> {
    let mut name = None;
    let mut dependency_spec = None;
    let mut array = None;
    let mut repeat = 1u32;
    let mut command: Vec<String> = Vec::new();
    let mut inline = false;
    let mut i = 0usize;
    while i < args.len() {
        let arg = args[i].as_str();
        if inline {
            // Everything after --- belongs to the inline command verbatim.
            command.push(arg.to_string());
            i += 1;
            continue;
        }
        match arg {
            "-J" | "--job-name" => {
                i += 1;
                let value = args.get(i).ok_or("--job-name requires NAME")?;
                name = Some(value.to_string());
            }
            "-D" | "--dependency" => {
                i += 1;
                let value = args.get(i).ok_or("--dependency requires SPEC")?;
                dependency_spec = Some(value.to_string());
            }
            "-a" | "--array" => {
                i += 1;
                let value = args.get(i).ok_or("--array requires SPEC")?;
                array = Some(value.to_string());
            }
            "--repeat" => {
                i += 1;
                let value = args.get(i).ok_or("--repeat requires N")?;
                repeat = value
                    .parse::<u32>()
                    .map_err(|_| "--repeat must be a positive integer")?;
            }
            gq_manager::script::INLINE_SEPARATOR => {
                inline = true;
                command.push(arg.to_string());
            }
            // Anything else is sbatch's business, not ours.
            other => command.push(other.to_string()),
        }
        i += 1;
    }
    if command.is_empty() {
        return Err("submit needs a script file or an inline `---` command".to_string());
    }

    let request = SubmitRequest {
        name,
        command,
        dependency_spec,
        array,
        repeat,
    };
    let rows = manager.submit(&request).map_err(|err| err.to_string())?;
    for row in &rows {
        println!(
            "Submitted job {} (scheduler id {})",
            row.id,
            format_opt_id(row.slurm_id)
        );
    }
    Ok(())
}

/// Shared selection flags for the list-style commands.
#[derive(Default)]
struct Selection {
    filter: JobFilter,
    dependents: bool,
    refresh: bool,
}

fn parse_selection(args: &[String], command: &str) -> Result<Selection, String> {
    let mut selection = Selection::default();
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "-j" | "--jobs" => {
                i += 1;
                let value = args.get(i).ok_or("--jobs requires IDS")?;
                selection.filter.ids = parse_job_ids(value).map_err(|err| err.to_string())?;
            }
            "-s" | "--state" | "--states" => {
                i += 1;
                let value = args.get(i).ok_or("--states requires STATES")?;
                selection.filter.states = parse_states(value).map_err(|err| err.to_string())?;
            }
            "-n" | "--name" => {
                i += 1;
                let value = args.get(i).ok_or("--name requires NAME")?;
                selection.filter.names.push(value.to_string());
            }
            "--dependents" => selection.dependents = true,
            "--refresh" => selection.refresh = true,
            other => return Err(format!("unknown option {other} for {command}")),
        }
        i += 1;
    }
    Ok(selection)
}

fn cmd_list<S: Scheduler>(manager: &mut JobManager<S>, args: &[String]) -> Result<(), String> {
    let selection = parse_selection(args, "list")?;
    let jobs = manager
        .list(&selection.filter, selection.dependents, selection.refresh)
        .map_err(|err| err.to_string())?;
    print!("{}", table::render_jobs(&jobs));
    warn_stale(&jobs);
    Ok(())
}

fn cmd_report<S: Scheduler>(manager: &mut JobManager<S>, args: &[String]) -> Result<(), String> {
    let selection = parse_selection(args, "report")?;
    let jobs = manager
        .list(&selection.filter, selection.dependents, selection.refresh)
        .map_err(|err| err.to_string())?;
    for job in &jobs {
        print!("{}", render_report(job));
    }
    warn_stale(&jobs);
    Ok(())
}

fn render_report(job: &RefreshedJob) -> String {
    let row = &job.row;
    let mut out = String::new();
    out.push_str(&format!(
        "Job {} (scheduler id {}) — {}\n",
        row.id,
        format_opt_id(row.slurm_id),
        job.state_label()
    ));
    out.push_str(&format!("  name:         {}\n", row.name));
    if let Some(nodes) = &row.nodes {
        out.push_str(&format!("  nodes:        {nodes}\n"));
    }
    if let Some(spec) = &row.dependency_spec {
        out.push_str(&format!("  dependencies: {spec}\n"));
    }
    out.push_str(&format!("  command:      {}\n", row.command.join(" ")));
    out.push_str(&format!(
        "  submitted:    {}\n",
        row.submitted_command.join(" ")
    ));
    if let Some(script) = &row.script_content {
        out.push_str("  script:\n");
        for line in script.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }
    let output_files = row.output_files();
    if output_files.is_empty() {
        out.push_str("  output: (no scheduler id yet)\n");
    }
    for path in output_files {
        out.push_str(&format!("  output: {}\n", path.display()));
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    out.push_str(&format!("    {line}\n"));
                }
            }
            Err(_) => out.push_str("    (log file not readable yet)\n"),
        }
    }
    out
}

fn cmd_stop<S: Scheduler>(manager: &mut JobManager<S>, args: &[String]) -> Result<(), String> {
    let selection = parse_selection(args, "stop")?;
    let rows = manager
        .stop(&selection.filter, selection.dependents)
        .map_err(|err| err.to_string())?;
    for row in &rows {
        println!("Stopped job {} (scheduler id {})", row.id, format_opt_id(row.slurm_id));
    }
    Ok(())
}

fn cmd_resubmit<S: Scheduler>(
    manager: &mut JobManager<S>,
    args: &[String],
) -> Result<(), String> {
    let selection = parse_selection(args, "resubmit")?;
    let rows = manager
        .resubmit(&selection.filter, selection.dependents)
        .map_err(|err| err.to_string())?;
    for row in &rows {
        println!(
            "Resubmitted job {} (scheduler id {})",
            row.id,
            format_opt_id(row.slurm_id)
        );
    }
    Ok(())
}

fn cmd_delete<S: Scheduler>(manager: &mut JobManager<S>, args: &[String]) -> Result<(), String> {
    let selection = parse_selection(args, "delete")?;
    let rows = manager
        .delete(&selection.filter, selection.dependents)
        .map_err(|err| err.to_string())?;
    for row in &rows {
        println!("Deleted job {}", row.id);
    }
    Ok(())
}

fn format_opt_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

fn warn_stale(jobs: &[RefreshedJob]) {
    for job in jobs {
        if let Some(note) = &job.note {
            eprintln!("gridq: job {}: {note}", job.row.id);
        }
    }
}
