/*!
# Introduction

`check-service` is a monitoring check plugin that reports whether a service exists, is in a given
state, and runs as a given user.

It prints a single line and exits with a status code that Nagios-compatible supervisors understand:

```text
$ check-service -name sshd -state running
CheckService OK - sshd in a running state
$ echo $?
0
$ check-service -name sshd -state stopped
CheckService CRITICAL - sshd not in a stopped state (Name: sshd, State: running, User: root)
$ echo $?
2
```

# Checks

The `-name` option is always required. Which checks run depends on the other options:

* `-state` and `-user`: the service must be in the state *and* run as the user.
* `-state` only: the service must be in the state.
* `-user` only: the service must run as the user.
* neither: the service must exist.

Names, states and users are compared case-insensitively.

# Service managers

On Linux the service is looked up with `systemctl show`, and its user is either the unit's `User=`
or the owner of its main process.
A unit whose sub-state is `dead` is reported as `stopped`.
On Windows the service control manager is queried through PowerShell.
`-manager systemd|windows` overrides the platform default.

A service the manager doesn't know about is reported as not existing (CRITICAL).
If the manager can't be asked at all, the check prints `CheckService UNKNOWN - <error>` and exits
with 3.

# Configuration

`--config <path>` names an optional TOML file:

```toml
manager = "systemd"
systemctl-path = "/usr/bin/systemctl"
ps-path = "/usr/bin/ps"
powershell-path = "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe"
```

Command line options take precedence over the file.
`--log-level` sends logs to stderr, leaving stdout for the status line.
*/

#![deny(rust_2018_idioms, unreachable_pub, missing_copy_implementations)]

mod args;
mod config;
mod error;
mod service_info;
mod service_status;

use crate::args::{parse_args, USAGE};
use crate::config::{Config, Settings};
use crate::error::{Error, Result};
use crate::service_info::ServiceInfoSource;
use crate::service_status::{CheckResult, ServiceQuery};
use env_logger::Builder;
use log::{debug, trace};
use nagiosplugin::ServiceState;
use std::sync::Once;
use std::{env, process};

fn main() -> ! {
    process::exit(match main_inner(env::args(), None) {
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
            println!("CheckService {} - {}", ServiceState::Unknown, err);
            ServiceState::Unknown.exit_code()
        }
    })
}

/// To facilitate testing of `main_inner` function, ensure that the logger is only initialized once.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Runs one check. `source` replaces the service manager picked from the settings; pub(crate) for
/// testing.
pub(crate) fn main_inner<A>(
    args: A,
    source: Option<Box<dyn ServiceInfoSource>>,
) -> Result<CheckResult>
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

    let config = match &arguments.config_path {
        None => Config::default(),
        Some(filepath) => Config::from_file(filepath)?,
    };
    let settings = Settings::new(arguments, config);
    debug!("{:?}", settings);

    let source = source.unwrap_or_else(|| service_info::source_for(&settings));
    let status = ServiceQuery::new(
        settings.name.as_str(),
        settings.state.as_str(),
        settings.user.as_str(),
    )
    .with_source(source)
    .acquire_actual()?;
    debug!("{:?}", status);

    Ok(status.classify())
}
