//! Provides the list of errors for `check-perfcounter`.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub(crate) enum Error {
    #[snafu(display("Unable to parse '{}' as a number: {}", value, source))]
    FloatParse {
        value: String,
        source: std::num::ParseFloatError,
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

    #[snafu(display("Unable to read performance counter '{}': {}", counter, source))]
    PerfCounter {
        counter: String,
        source: perfcounters::Error,
    },

    #[snafu(display("Usage error."))]
    Usage { message: Option<String> },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
