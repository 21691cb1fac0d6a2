//! Provides the list of errors for `perfcounters`.

use snafu::Snafu;
use std::io;

/// Describes an exit status code, which is absent when the process was killed by a signal.
fn exit_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| String::from("none"))
}

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("No PowerShell executor given to sample counter '{}'", counter))]
    NoExecutor { counter: String },

    #[snafu(display("Error starting command '{}': {}", command, source))]
    CommandSpawn { command: String, source: io::Error },

    #[snafu(display(
        "Command '{}' failed with exit code {}: {}",
        command,
        exit_code(code),
        stderr.trim()
    ))]
    CommandStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[snafu(display("Could not parse '{}' as a number: {}", output, source))]
    ParseFloat {
        output: String,
        source: std::num::ParseFloatError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
