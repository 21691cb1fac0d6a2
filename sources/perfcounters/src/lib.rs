/*!
# Introduction

`perfcounters` reads the value of a performance counter by asking PowerShell's `Get-Counter` to
sample it.

The native performance data helper library misbehaves on some processor architectures, so rather
than calling it directly this library builds a small PowerShell pipeline, runs it in
non-interactive mode, and parses the single number it prints.
The pipeline takes `polling_attempts` samples, `polling_delay` seconds apart, and prints their
average; no sampling or averaging happens in this library.

```no_run
let reading = perfcounters::read_performance_counter(r"\Processor(_Total)\% Processor Time", 2, 1)?;
println!("{} = {}", reading.name, reading.value);
# Ok::<(), perfcounters::Error>(())
```

Commands are run through the [`Execute`] trait, so callers (and tests) can swap in their own
executor with [`read_performance_counter_with_handler`].
*/

#![deny(rust_2018_idioms)]

mod error;
mod executor;

pub use crate::error::{Error, Result};
pub use crate::executor::{CommandOutput, Execute, PowerShell};

use log::{debug, error};
use snafu::{OptionExt, ResultExt};

/// The name of a performance counter and the value read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceCounter {
    pub name: String,
    pub value: f64,
}

/// Reads a performance counter using `executor` to run PowerShell.
///
/// `polling_attempts` and `polling_delay` are handed to `Get-Counter` as `-MaxSamples` and
/// `-SampleInterval` without validation; PowerShell decides what to do with odd values.
pub fn read_performance_counter_with_handler(
    executor: Option<&dyn Execute>,
    counter: &str,
    polling_attempts: i64,
    polling_delay: i64,
) -> Result<PerformanceCounter> {
    let executor = executor.context(error::NoExecutor { counter })?;

    let mut perfcounter = PerformanceCounter {
        name: counter.to_string(),
        value: 0.0,
    };

    let command = sampling_command(counter, polling_attempts, polling_delay);
    debug!(
        "Generated PowerShell performance counter command:\n{}",
        command
    );

    let output = match executor.execute(&[command.as_str()]) {
        Ok(output) => output,
        Err(e) => {
            error!(
                "Error running PowerShell to retrieve performance counter values: {}",
                e
            );
            return Err(e);
        }
    };
    debug!("PowerShell output:\n{}", output.stdout);

    let trimmed = output.stdout.trim();
    perfcounter.value = trimmed
        .parse::<f64>()
        .context(error::ParseFloat { output: trimmed })?;

    Ok(perfcounter)
}

/// Reads a performance counter through the PowerShell found on `PATH`.
pub fn read_performance_counter(
    counter: &str,
    polling_attempts: i64,
    polling_delay: i64,
) -> Result<PerformanceCounter> {
    let powershell = PowerShell::new();
    read_performance_counter_with_handler(Some(&powershell), counter, polling_attempts, polling_delay)
}

/// Builds the pipeline that samples `counter` and prints the average of the cooked values.
fn sampling_command(counter: &str, polling_attempts: i64, polling_delay: i64) -> String {
    format!(
        "Write-Output (Get-Counter -Counter \"{}\" -SampleInterval {} -MaxSamples {} |\n",
        escape_double_quoted(counter),
        polling_delay,
        polling_attempts
    ) + "Select-Object -ExpandProperty CounterSamples |\n"
        + "Select-Object -ExpandProperty CookedValue |\n"
        + "Measure-Object -Average).Average"
}

/// Backtick-escapes the characters PowerShell interprets inside a double-quoted string.
fn escape_double_quoted(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '`' | '"' | '$') {
            escaped.push('`');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    /// Records every command it is asked to run and answers with a canned result.
    struct MockExecutor {
        stdout: Option<&'static str>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl MockExecutor {
        fn printing(stdout: &'static str) -> Self {
            Self {
                stdout: Some(stdout),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                stdout: None,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Execute for MockExecutor {
        fn execute(&self, args: &[&str]) -> Result<CommandOutput> {
            self.calls
                .borrow_mut()
                .push(args.iter().map(|&s| s.to_owned()).collect());
            match self.stdout {
                Some(stdout) => Ok(CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
                None => Err(Error::CommandStatus {
                    command: String::from("powershell.exe"),
                    code: Some(1),
                    stderr: String::from("Get-Counter : The specified object was not found"),
                }),
            }
        }
    }

    const COUNTER: &str = r"\Processor(_Total)\% Processor Time";

    #[test]
    fn reads_trimmed_average() {
        let executor = MockExecutor::printing("  42.5\n");
        let reading = read_performance_counter_with_handler(Some(&executor), COUNTER, 2, 1).unwrap();
        assert_eq!(
            reading,
            PerformanceCounter {
                name: COUNTER.to_string(),
                value: 42.5,
            }
        );
    }

    #[test]
    fn runs_one_command() {
        let executor = MockExecutor::printing("1");
        read_performance_counter_with_handler(Some(&executor), COUNTER, 5, 3).unwrap();
        let calls = executor.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 1);
        let command = &calls[0][0];
        assert!(command.starts_with(&format!(
            "Write-Output (Get-Counter -Counter \"{}\" -SampleInterval 3 -MaxSamples 5 |\n",
            COUNTER
        )));
        assert!(command.ends_with("Measure-Object -Average).Average"));
    }

    #[test]
    fn non_numeric_output() {
        let executor = MockExecutor::printing("not-a-number");
        match read_performance_counter_with_handler(Some(&executor), COUNTER, 2, 1) {
            Err(Error::ParseFloat { output, .. }) => assert_eq!(output, "not-a-number"),
            other => panic!("expected Error::ParseFloat, got {:?}", other),
        }
    }

    #[test]
    fn empty_output() {
        let executor = MockExecutor::printing("\r\n");
        let result = read_performance_counter_with_handler(Some(&executor), COUNTER, 2, 1);
        assert!(matches!(result, Err(Error::ParseFloat { .. })));
    }

    #[test]
    fn no_executor() {
        match read_performance_counter_with_handler(None, COUNTER, 2, 1) {
            Err(Error::NoExecutor { counter }) => assert_eq!(counter, COUNTER),
            other => panic!("expected Error::NoExecutor, got {:?}", other),
        }
    }

    #[test]
    fn executor_error_is_forwarded() {
        let executor = MockExecutor::failing();
        let result = read_performance_counter_with_handler(Some(&executor), COUNTER, 2, 1);
        assert!(matches!(result, Err(Error::CommandStatus { code: Some(1), .. })));
        assert_eq!(executor.calls.borrow().len(), 1);
    }

    #[test]
    fn odd_polling_values_pass_through() {
        let command = sampling_command("x", 0, -1);
        assert!(command.contains("-SampleInterval -1 -MaxSamples 0"));
    }

    #[test]
    fn counter_name_is_escaped() {
        assert_eq!(
            escape_double_quoted(r#"\a"b$c`d"#),
            r#"\a`"b`$c``d"#
        );
        assert_eq!(escape_double_quoted(COUNTER), COUNTER);
    }
}
