//! Plain-text job table.

use gq_manager::RefreshedJob;

const HEADER: [&str; 8] = [
    "job-id",
    "slurm-id",
    "nodes",
    "state",
    "job-name",
    "output",
    "dependencies",
    "command",
];

/// Render the job table with left-aligned, width-fitted columns. Always
/// renders every row; per-job refresh problems are reported separately.
pub(crate) fn render_jobs(jobs: &[RefreshedJob]) -> String {
    let mut rows: Vec<[String; 8]> = Vec::with_capacity(jobs.len());
    for job in jobs {
        let row = &job.row;
        // Array jobs list the first task's file; report shows them all.
        let output = row
            .output_files()
            .into_iter()
            .next()
            .unwrap_or_else(|| row.output_template())
            .to_string_lossy()
            .into_owned();
        rows.push([
            row.id.to_string(),
            row.slurm_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            row.nodes.clone().unwrap_or_else(|| "-".to_string()),
            job.state_label(),
            row.name.clone(),
            output,
            row.dependency_spec.clone().unwrap_or_default(),
            row.command.join(" "),
        ]);
    }

    let mut widths: [usize; 8] = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADER.map(str::to_string), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 8], widths: &[usize; 8]) {
    for (idx, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        // The last column runs ragged; no trailing padding.
        if idx + 1 < cells.len() {
            for _ in cell.len()..*width {
                out.push(' ');
            }
        }
    }
    out.push('\n');
}
