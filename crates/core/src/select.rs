#![forbid(unsafe_code)]

//! Parsing of job/state selections passed on the command line.

use crate::state::JobState;

#[derive(Debug, PartialEq, Eq)]
pub enum SelectError {
    InvalidJobId(String),
    InvalidState(String),
    InvalidArraySpec(String),
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJobId(raw) => write!(f, "invalid job id {raw}"),
            Self::InvalidArraySpec(raw) => write!(f, "invalid array specification {raw}"),
            Self::InvalidState(raw) => write!(
                f,
                "invalid state {raw} (known: {})",
                JobState::all_names().join(", ")
            ),
        }
    }
}

impl std::error::Error for SelectError {}

/// Parse a job-id selection: single ids, comma lists, `a-b` inclusive
/// ranges, and `a+n` (id `a` plus the next `n` ids).
pub fn parse_job_ids(selection: &str) -> Result<Vec<i64>, SelectError> {
    if selection.is_empty() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for part in selection.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_one(start, part)?;
            let end = parse_one(end, part)?;
            ids.extend(start..=end);
        } else if let Some((start, len)) = part.split_once('+') {
            let start = parse_one(start, part)?;
            let len = parse_one(len, part)?;
            ids.extend(start..=start + len);
        } else {
            ids.push(parse_one(part, part)?);
        }
    }
    Ok(ids)
}

fn parse_one(raw: &str, context: &str) -> Result<i64, SelectError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| SelectError::InvalidJobId(context.to_string()))
}

/// Parse an sbatch array specification into the task indexes it expands to:
/// comma-separated segments, `a-b` inclusive ranges with an optional `:step`
/// suffix, and a trailing `%limit` (a cap on simultaneous tasks, not an
/// index) that is ignored.
pub fn parse_array_indexes(spec: &str) -> Result<Vec<i64>, SelectError> {
    let indexes_part = spec.split('%').next().unwrap_or_default();
    let mut indexes = Vec::new();
    for segment in indexes_part.split(',') {
        let (range, step) = match segment.split_once(':') {
            Some((range, step)) => (range, Some(step)),
            None => (segment, None),
        };
        let step = match step {
            Some(raw) => {
                let step = parse_index(raw, spec)?;
                if step < 1 {
                    return Err(SelectError::InvalidArraySpec(spec.to_string()));
                }
                step
            }
            None => 1,
        };
        match range.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, spec)?;
                let end = parse_index(end, spec)?;
                let mut index = start;
                while index <= end {
                    indexes.push(index);
                    index += step;
                }
            }
            None => indexes.push(parse_index(range, spec)?),
        }
    }
    if indexes.is_empty() {
        return Err(SelectError::InvalidArraySpec(spec.to_string()));
    }
    Ok(indexes)
}

fn parse_index(raw: &str, context: &str) -> Result<i64, SelectError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| SelectError::InvalidArraySpec(context.to_string()))
}

/// Parse a comma-separated state filter into normalized states. Accepts the
/// short and long token forms and the special value `ALL`.
pub fn parse_states(selection: &str) -> Result<Vec<JobState>, SelectError> {
    if selection.is_empty() {
        return Ok(Vec::new());
    }
    if selection.eq_ignore_ascii_case("ALL") {
        return Ok(Vec::new());
    }
    let mut states = Vec::new();
    for part in selection.split(',') {
        match JobState::from_token(part) {
            JobState::Unrecognized(raw) => return Err(SelectError::InvalidState(raw)),
            state => {
                if !states.contains(&state) {
                    states.push(state);
                }
            }
        }
    }
    Ok(states)
}
