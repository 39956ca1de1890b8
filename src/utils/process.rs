// src/utils/process.rs

use std::{path::Path, process::Command};

use anyhow::{Context, Result};
use tracing::debug;

use crate::errors::SwitchError;

/// Runs an external program to completion and reports its exit code.
pub trait CommandRunner {
    /// Blocks until `program` exits.
    ///
    /// # Returns
    ///
    /// - `Ok(code)` once the process has exited, whatever the code.
    /// - `Err` with `SwitchError::MissingExecutable` if `program` does not exist.
    /// - `Err` for any other launch failure.
    fn run(&self, program: &Path, args: &[String]) -> Result<i32>;
}

/// Grants administrator rights to a maintenance command.
pub trait PrivilegeBroker {
    fn is_elevated(&self) -> bool;

    /// Re-launches the current executable with `args` and elevated rights,
    /// waits for it and returns its exit code.
    fn run_elevated(&self, args: &[String]) -> Result<i32>;
}

/// `CommandRunner` backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<i32> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let status = match Command::new(program).args(args).status() {
            Ok(status) => status,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SwitchError::MissingExecutable(program.to_path_buf()).into())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to launch '{}'", program.display()))
            }
        };

        // A process killed without an exit code counts as a failure.
        let code = status.code().unwrap_or(-1);
        debug!("{} exited with code {}", program.display(), code);
        Ok(code)
    }
}

/// Joins arguments into a single command line, quoting the ones that need it.
pub fn join_command_line(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"') {
                format!("\"{}\"", arg.replace('"', "\\\""))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
