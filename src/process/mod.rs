mod piped;
mod runner;

pub use piped::run_piped;
pub use runner::{run, CommandOutcome, CommandSpec};

/// Fixed working directory for every child process, so relative-path commands
/// behave the same regardless of where the operator invoked us.
pub(crate) const WORKDIR: &str = "/";
