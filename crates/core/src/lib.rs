#![forbid(unsafe_code)]

pub mod deps;
pub mod select;
pub mod state;

/// Default job name, and the name jobs are submitted under when the user
/// does not pick one.
pub const TOOL_NAME: &str = "gridq";
