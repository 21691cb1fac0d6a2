//! Sources that ask the local service manager for the name, state and user of a service.
//!
//! A service the manager doesn't know about is not an error. Sources report it as a
//! [`ServiceInfo`] with an empty name, which the check then reports as not existing. Errors are
//! kept for failing to ask at all.

use crate::config::{Manager, Settings};
use crate::error::{self, Result};
use log::{debug, trace};
use perfcounters::{Execute, PowerShell};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What the service manager reports about a service.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct ServiceInfo {
    pub(crate) name: String,
    pub(crate) state: String,
    pub(crate) user: String,
}

pub(crate) trait ServiceInfoSource {
    /// Looks up the given service.
    fn service_info(&self, service_name: &str) -> Result<ServiceInfo>;
}

impl<F> ServiceInfoSource for F
where
    F: Fn(&str) -> Result<ServiceInfo>,
{
    fn service_info(&self, service_name: &str) -> Result<ServiceInfo> {
        self(service_name)
    }
}

/// Creates the source for the manager named in `settings`.
pub(crate) fn source_for(settings: &Settings) -> Box<dyn ServiceInfoSource> {
    match settings.manager {
        Manager::Systemd => Box::new(SystemdInfo {
            systemctl: settings.systemctl_path.clone(),
            ps: settings.ps_path.clone(),
        }),
        Manager::Windows => {
            let powershell = match &settings.powershell_path {
                Some(path) => PowerShell::from_path(path),
                None => PowerShell::new(),
            };
            Box::new(WindowsServiceInfo {
                executor: powershell,
            })
        }
    }
}

struct Outcome {
    exit: i32,
    stdout: String,
    stderr: String,
}

impl Outcome {
    fn is_exit_true(&self) -> bool {
        self.exit == 0
    }
}

fn command(program: &Path, args: &[&str]) -> Result<Outcome> {
    trace!("calling {} with '{:?}'", program.display(), args);
    let output = Command::new(program)
        .args(args)
        .output()
        .context(error::ServiceCommand {
            command: program.display().to_string(),
        })?;
    Ok(Outcome {
        exit: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(output.stdout.as_slice()).into(),
        stderr: String::from_utf8_lossy(output.stderr.as_slice()).into(),
    })
}

/// Asks systemd about a unit through `systemctl show`.
pub(crate) struct SystemdInfo {
    pub(crate) systemctl: PathBuf,
    pub(crate) ps: PathBuf,
}

const SYSTEMD_PROPERTIES: &str = "--property=Id,LoadState,ActiveState,SubState,MainPID,User";

impl ServiceInfoSource for SystemdInfo {
    fn service_info(&self, service_name: &str) -> Result<ServiceInfo> {
        let outcome = command(
            &self.systemctl,
            &["show", "--no-pager", SYSTEMD_PROPERTIES, service_name],
        )?;
        ensure!(
            outcome.is_exit_true(),
            error::ServiceCommandStatus {
                command: self.systemctl.display().to_string(),
                code: outcome.exit,
                stderr: outcome.stderr,
            }
        );

        let unit = UnitProperties::parse(&outcome.stdout, service_name)?;
        debug!("'{}' is unit {} ({:?})", service_name, unit.id, unit);
        if unit.is_not_found() {
            return Ok(ServiceInfo::default());
        }

        let user = if !unit.user.is_empty() {
            unit.user.clone()
        } else if unit.main_pid != 0 {
            self.process_owner(unit.main_pid)?
        } else {
            String::new()
        };

        // systemd resolves aliases, so the unit that answered is the service that was asked for
        Ok(ServiceInfo {
            name: service_name.to_string(),
            state: unit.state(),
            user,
        })
    }
}

impl SystemdInfo {
    /// Returns the user name that owns the process, or an empty string if the process is gone.
    fn process_owner(&self, pid: u32) -> Result<String> {
        let pid = pid.to_string();
        let outcome = command(&self.ps, &["-o", "user=", "-p", &pid])?;
        if !outcome.is_exit_true() {
            debug!("process {} exited before its owner could be read", pid);
            return Ok(String::new());
        }
        Ok(outcome.stdout.trim().to_string())
    }
}

/// The `systemctl show` properties used to describe a service.
#[derive(Debug, Clone, Eq, PartialEq)]
struct UnitProperties {
    id: String,
    load_state: String,
    active_state: String,
    sub_state: String,
    main_pid: u32,
    user: String,
}

impl UnitProperties {
    fn parse(stdout: &str, service_name: &str) -> Result<Self> {
        trace!("parsing systemctl stdout:\n{}", stdout);
        let properties: HashMap<&str, &str> = stdout
            .lines()
            .filter_map(|line| line.split_once('='))
            .collect();
        let property = |key: &str| -> Result<String> {
            properties
                .get(key)
                .map(|&value| value.to_string())
                .context(error::ServiceOutput {
                    command: "systemctl show",
                    service: service_name,
                    reason: format!("missing property {}", key),
                })
        };

        let id = property("Id")?;
        let load_state = property("LoadState")?;
        let active_state = property("ActiveState")?;
        let sub_state = property("SubState")?;
        let main_pid = property("MainPID")?;
        Ok(Self {
            id,
            load_state,
            active_state,
            sub_state,
            main_pid: main_pid
                .parse::<u32>()
                .context(error::IntParse { value: main_pid.as_str() })?,
            // only present for units that set User=
            user: property("User").unwrap_or_default(),
        })
    }

    fn is_not_found(&self) -> bool {
        self.load_state == "not-found"
    }

    /// The unit's sub-state, with `dead` reported as `stopped`. Falls back to the active state
    /// for units without a sub-state.
    fn state(&self) -> String {
        match self.sub_state.as_str() {
            "dead" => String::from("stopped"),
            "" => self.active_state.clone(),
            sub_state => sub_state.to_string(),
        }
    }
}

/// Asks the Windows service control manager about a service through PowerShell.
pub(crate) struct WindowsServiceInfo<E: Execute> {
    pub(crate) executor: E,
}

impl<E: Execute> ServiceInfoSource for WindowsServiceInfo<E> {
    fn service_info(&self, service_name: &str) -> Result<ServiceInfo> {
        let command = win32_service_command(service_name);
        trace!("querying Win32_Service with:\n{}", command);
        let output = self
            .executor
            .execute(&[command.as_str()])
            .context(error::PowerShell {
                service: service_name,
            })?;
        parse_win32_service(&output.stdout, service_name)
    }
}

/// Builds a PowerShell command printing the service's name, state and start name, separated by
/// tabs. It prints nothing for an unknown service.
fn win32_service_command(service_name: &str) -> String {
    format!(
        r#"$name = '{}'
Get-CimInstance -ClassName Win32_Service |
Where-Object {{ $_.Name -eq $name }} |
ForEach-Object {{ "{{0}}`t{{1}}`t{{2}}" -f $_.Name, $_.State, $_.StartName }}"#,
        // single-quoted strings only give meaning to the single quote, which is escaped by doubling
        service_name.replace('\'', "''")
    )
}

fn parse_win32_service(stdout: &str, service_name: &str) -> Result<ServiceInfo> {
    // trailing tabs stay: an empty start name is the last field
    let line = match stdout.lines().find(|l| !l.trim().is_empty()) {
        Some(line) => line,
        None => return Ok(ServiceInfo::default()),
    };
    let mut fields = line.splitn(3, '\t');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(name), Some(state), Some(user)) => Ok(ServiceInfo {
            name: name.to_string(),
            state: state.to_string(),
            user: user.to_string(),
        }),
        _ => error::ServiceOutput {
            command: "Get-CimInstance Win32_Service",
            service: service_name,
            reason: format!("expected name, state and user separated by tabs, got '{}'", line),
        }
        .fail(),
    }
}
