//! Provides the list of errors for `check-service`.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub(crate) enum Error {
    #[snafu(display("Failed to parse config file {}: {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Failed to read config file {}: {}", path.display(), source))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse '{}' as an integer: {}", value, source))]
    IntParse {
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Invalid log level '{}'", log_level_str))]
    LogLevel {
        log_level_str: String,
        source: log::ParseLevelError,
    },

    #[snafu(display("No get service info handler declared for '{}'", service))]
    NoServiceInfoHandler { service: String },

    #[snafu(display("Unable to query service '{}' through PowerShell: {}", service, source))]
    PowerShell {
        service: String,
        source: perfcounters::Error,
    },

    #[snafu(display("Error running '{}': {}", command, source))]
    ServiceCommand {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("'{}' failed with exit code {}: {}", command, code, stderr.trim()))]
    ServiceCommandStatus {
        command: String,
        code: i32,
        stderr: String,
    },

    #[snafu(display("Unexpected output from {} for service '{}': {}", command, service, reason))]
    ServiceOutput {
        command: String,
        service: String,
        reason: String,
    },

    #[snafu(display("Usage error."))]
    Usage { message: Option<String> },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
