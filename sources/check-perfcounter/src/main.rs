/*!
# Introduction

`check-perfcounter` is a monitoring check plugin that reads a Windows performance counter and
compares it against warning and critical thresholds.

The counter is sampled `-polling_attempts` times, `-polling_delay` seconds apart, by PowerShell's
`Get-Counter`, and the average of the samples is checked:

```text
> check-perfcounter -counter_name "\Processor(_Total)\% Processor Time" -warning 80 -critical 95 -greater_than
CheckPerfCounter OK - \Processor(_Total)\% Processor Time = 12.5
```

Without `-greater_than`, a value *below* a threshold raises the alert, which suits counters such
as available memory.
Exit codes follow Nagios: 0 OK, 1 WARNING, 2 CRITICAL, and 3 UNKNOWN when the counter could not be
read.
*/

#![deny(rust_2018_idioms, unreachable_pub, missing_copy_implementations)]

mod args;
mod error;

use crate::args::{parse_args, Arguments, USAGE};
use crate::error::{Error, Result};
use env_logger::Builder;
use log::{debug, trace};
use nagiosplugin::{Metric, Resource, ServiceState, TriggerIfValue};
use perfcounters::{Execute, PerformanceCounter, PowerShell};
use snafu::ResultExt;
use std::sync::Once;
use std::{env, process};

/// The line to print and the status to exit with.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckResult {
    pub(crate) message: String,
    pub(crate) status: ServiceState,
}

fn main() -> ! {
    let powershell = PowerShell::new();
    process::exit(match main_inner(env::args(), &powershell) {
        Ok(result) => {
            println!("{}", result.message);
            result.status.exit_code()
        }
        Err(Error::Usage { message: None }) => {
            println!("{}", USAGE);
            ServiceState::Ok.exit_code()
        }
        Err(Error::Usage {
            message: Some(message),
        }) => {
            eprintln!("{}\n", message);
            eprintln!("{}", USAGE);
            ServiceState::Unknown.exit_code()
        }
        Err(err) => {
            println!("CheckPerfCounter {} - {}", ServiceState::Unknown, err);
            ServiceState::Unknown.exit_code()
        }
    })
}

/// To facilitate testing of `main_inner` function, ensure that the logger is only initialized once.
static INIT_LOGGER_ONCE: Once = Once::new();

/// pub(crate) for testing.
pub(crate) fn main_inner<A>(args: A, executor: &dyn Execute) -> Result<CheckResult>
where
    A: Iterator<Item = String>,
{
    let arguments = parse_args(args)?;
    INIT_LOGGER_ONCE.call_once(|| {
        match arguments.log_level {
            None => Builder::new().init(),
            Some(level) => Builder::new().filter_level(level).init(),
        }
        trace!("logger initialized");
    });
    debug!("{:?}", arguments);

    let reading = perfcounters::read_performance_counter_with_handler(
        Some(executor),
        &arguments.counter_name,
        arguments.polling_attempts,
        arguments.polling_delay,
    )
    .context(error::PerfCounter {
        counter: arguments.counter_name.as_str(),
    })?;

    Ok(evaluate(&reading, &arguments))
}

/// Checks the reading against the thresholds. With `-greater_than` a value above a threshold
/// breaches it, otherwise a value below it does.
fn evaluate(reading: &PerformanceCounter, arguments: &Arguments) -> CheckResult {
    let status = if arguments.warning.is_none() && arguments.critical.is_none() {
        ServiceState::Ok
    } else {
        let trigger = if arguments.greater_than {
            TriggerIfValue::Greater
        } else {
            TriggerIfValue::Less
        };
        let metric = Metric::new(reading.name.as_str(), reading.value).with_thresholds(
            arguments.warning,
            arguments.critical,
            trigger,
        );
        let (status, _) = Resource::new("CheckPerfCounter")
            .with_result(metric)
            .nagios_result();
        status
    };
    CheckResult {
        message: format!(
            "CheckPerfCounter {} - {} = {}",
            status, reading.name, reading.value
        ),
        status,
    }
}
