use crate::error::{self, Result};
use log::trace;
use snafu::{ensure, ResultExt};
use std::path::PathBuf;
use std::process::Command;

#[cfg(windows)]
const POWERSHELL: &str = "powershell.exe";
#[cfg(not(windows))]
const POWERSHELL: &str = "pwsh";

/// Flags that keep PowerShell from loading profiles or waiting on user input. They always precede
/// the caller's arguments. Without `-Command`, `pwsh` reads the first argument as a script path.
const NON_INTERACTIVE_ARGS: [&str; 3] = ["-NoProfile", "-NonInteractive", "-Command"];

/// The captured output of a command that ran to a successful exit.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that can run a command line and hand back what it printed.
pub trait Execute {
    /// Runs the command with the given arguments. A command that cannot be started, or that exits
    /// with a non-zero status, is an error.
    fn execute(&self, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands through a PowerShell executable in non-interactive mode.
#[derive(Debug, Clone)]
pub struct PowerShell {
    path: PathBuf,
}

impl PowerShell {
    /// Locates PowerShell on `PATH`. If it can't be found the bare executable name is used, and
    /// the failure surfaces when a command is executed.
    pub fn new() -> Self {
        Self::from_path(which::which(POWERSHELL).unwrap_or_else(|_| PathBuf::from(POWERSHELL)))
    }

    /// Uses the PowerShell executable at the given path.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Default for PowerShell {
    fn default() -> Self {
        Self::new()
    }
}

impl Execute for PowerShell {
    fn execute(&self, args: &[&str]) -> Result<CommandOutput> {
        let command = self.path.display().to_string();
        trace!("calling {} with '{:?}'", command, args);
        let output = Command::new(&self.path)
            .args(&NON_INTERACTIVE_ARGS)
            .args(args)
            .output()
            .context(error::CommandSpawn {
                command: command.as_str(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        ensure!(
            output.status.success(),
            error::CommandStatus {
                command,
                code: output.status.code(),
                stderr,
            }
        );
        Ok(CommandOutput { stdout, stderr })
    }
}
