#![forbid(unsafe_code)]

//! Temporary submission scripts for the inline-command form.
//!
//! `gridq submit [flags] --- <command...>` has no script file; we write one,
//! hand its path to the scheduler, and remove it again no matter how the
//! submission ends. The script content is persisted on the job record, so
//! the temporary file is never the durable copy.

use std::path::{Path, PathBuf};

/// Separator between scheduler flags and the inline command.
pub const INLINE_SEPARATOR: &str = "---";

/// A script file that is deleted when the guard goes out of scope, on both
/// the success and the failure path of a submission.
#[derive(Debug)]
pub struct TempScript {
    path: PathBuf,
}

impl TempScript {
    pub fn create(content: &str) -> std::io::Result<Self> {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "gridq_{}_{nonce}.sh",
            std::process::id()
        ));
        std::fs::write(&path, content)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempScript {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Bash script for the command after the `---` separator, or None when the
/// command has no inline part.
pub fn inline_script(command: &[String]) -> Option<String> {
    let split_idx = command.iter().position(|arg| arg == INLINE_SEPARATOR)?;
    let mut content = String::from("#!/bin/bash\n");
    content.push_str(&sh_join(&command[split_idx + 1..]));
    content.push('\n');
    Some(content)
}

/// Join an argument vector into one shell-safe command line.
pub fn sh_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| sh_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sh_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-'));
    if safe {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}
