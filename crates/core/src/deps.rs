#![forbid(unsafe_code)]

//! Dependency-expression handling.
//!
//! A dependency expression is the value of sbatch's `--dependency` flag,
//! e.g. `afterok:3:4,afterany:7` or `after:3+5`. Users write **local** job
//! ids in it; the ids are rewritten to scheduler ids only when the argv for
//! an actual submission is built, so the stored expression stays valid when
//! a prerequisite is resubmitted under a new scheduler id.

#[derive(Debug, PartialEq, Eq)]
pub enum DepSpecError {
    /// Rewrite was given fewer replacement ids than the expression contains.
    NotEnoughReplacements,
}

impl std::fmt::Display for DepSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEnoughReplacements => {
                write!(f, "not enough replacement ids for dependency expression")
            }
        }
    }
}

impl std::error::Error for DepSpecError {}

/// Extract the job ids from a dependency expression, in order of appearance.
///
/// A `+<minutes>` suffix (the `after:id+time` form) belongs to the preceding
/// id and is not an id itself.
pub fn job_ids_from_spec(spec: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    let bytes = spec.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if let Ok(id) = spec[start..i].parse::<i64>() {
                ids.push(id);
            }
            if i < bytes.len() && bytes[i] == b'+' {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        } else {
            i += 1;
        }
    }
    ids
}

/// Rewrite every job id in the expression with the next id from
/// `replacements`, keeping separators, dependency types and `+time` suffixes
/// intact.
pub fn replace_job_ids_in_spec(
    spec: &str,
    replacements: &[i64],
) -> Result<String, DepSpecError> {
    let mut out = String::with_capacity(spec.len());
    let mut next = replacements.iter();
    let bytes = spec.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let Some(replacement) = next.next() else {
                return Err(DepSpecError::NotEnoughReplacements);
            };
            out.push_str(&replacement.to_string());
            if i < bytes.len() && bytes[i] == b'+' {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                out.push_str(&spec[start..i]);
            }
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    Ok(out)
}
