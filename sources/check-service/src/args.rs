use crate::config::Manager;
use crate::error::{self, Error, Result};
use log::LevelFilter;
use snafu::{ensure, OptionExt, ResultExt};
use std::path::PathBuf;
use std::str::FromStr;

/// The parsed command line. Options that were not given are `None`.
#[derive(Debug)]
pub(crate) struct Arguments {
    pub(crate) name: String,
    pub(crate) state: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) manager: Option<Manager>,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) log_level: Option<LevelFilter>,
}

/// The usage message for --help.
pub(crate) const USAGE: &str = r"USAGE:
check-service -name <service name> [ other options ]
  Perform various checks for a service. These checks depend on the options given and
  the -name option is always required.

OPTIONS:
    -name <service name>    Required. The name of the service to check.
    [ -state <state> ]      The state the service should be in, e.g. running or stopped.
    [ -user <user> ]        The user the service should be running as.
    [ -manager <manager> ]  The local service manager: systemd or windows.
                            Defaults to the manager of the current platform.
    [ --config <path> ]     Path to an optional TOML config file.
    [ --log-level <level> ] off, error, warn, info, debug, or trace. Logs go to stderr.

Options may be given with one or two leading dashes, and as '-option value' or '-option=value'.
";

/// Parses the command line arguments.
pub(crate) fn parse_args<A>(args: A) -> Result<Arguments>
where
    A: Iterator<Item = String>,
{
    let mut name = None;
    let mut state = None;
    let mut user = None;
    let mut manager = None;
    let mut config_path = None;
    let mut log_level = None;
    let mut iter = args.skip(1).peekable();

    // with no arguments at all, just show the help
    if iter.peek().is_none() {
        return Err(Error::Usage { message: None });
    }

    while let Some(arg) = iter.next() {
        let (flag, inline_value) = match split_flag(&arg) {
            Some(split) => split,
            None => {
                return Err(Error::Usage {
                    message: Some(format!("Unexpected argument: '{}'", arg)),
                });
            }
        };
        match flag {
            "name" => name = Some(value(flag, inline_value, &mut iter)?),
            "state" => state = Some(value(flag, inline_value, &mut iter)?),
            "user" => user = Some(value(flag, inline_value, &mut iter)?),
            "manager" => {
                manager = Some(Manager::parse(value(flag, inline_value, &mut iter)?)?);
            }
            "config" => {
                config_path = Some(PathBuf::from(value(flag, inline_value, &mut iter)?));
            }
            "log-level" => {
                let log_level_str = value(flag, inline_value, &mut iter)?;
                log_level = Some(
                    LevelFilter::from_str(&log_level_str)
                        .context(error::LogLevel { log_level_str })?,
                );
            }
            "h" | "help" => return Err(Error::Usage { message: None }),
            _ => {
                return Err(Error::Usage {
                    message: Some(format!("Unexpected argument: '{}'", arg)),
                });
            }
        }
    }

    let name: String = name.context(error::Usage {
        message: String::from("The -name option is required"),
    })?;
    ensure!(
        !name.is_empty(),
        error::Usage {
            message: String::from("The -name option must not be empty"),
        }
    );

    Ok(Arguments {
        name,
        state,
        user,
        manager,
        config_path,
        log_level,
    })
}

/// Splits `--flag=value`, `-flag=value`, `--flag` and `-flag` into the bare flag name and any
/// value given after '='. Returns `None` for arguments without a leading dash.
fn split_flag(arg: &str) -> Option<(&str, Option<&str>)> {
    let stripped = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    Some(match stripped.find('=') {
        Some(i) => (&stripped[..i], Some(&stripped[i + 1..])),
        None => (stripped, None),
    })
}

/// Returns the value given inline with '=', or else the next argument.
fn value<I>(flag: &str, inline_value: Option<&str>, iter: &mut I) -> Result<String>
where
    I: Iterator<Item = String>,
{
    match inline_value {
        Some(v) => Ok(v.to_string()),
        None => iter.next().context(error::Usage {
            message: format!("Did not give argument to -{}", flag),
        }),
    }
}

#[cfg(test)]
fn args(raw: &[&str]) -> impl Iterator<Item = String> {
    std::iter::once(String::from("/bin/check-service"))
        .chain(raw.iter().map(|&s| s.to_owned()))
        .collect::<Vec<String>>()
        .into_iter()
}

#[test]
fn parse_args_name_only() {
    let args = parse_args(args(&["-name", "sshd"])).unwrap();
    assert_eq!(args.name, "sshd");
    assert!(args.state.is_none());
    assert!(args.user.is_none());
    assert!(args.manager.is_none());
    assert!(args.config_path.is_none());
    assert!(args.log_level.is_none());
}

#[test]
fn parse_args_all_options() {
    let args = parse_args(args(&[
        "--name",
        "sshd",
        "-state",
        "running",
        "-user=root",
        "--manager=systemd",
        "--config",
        "/some/path",
        "--log-level",
        "debug",
    ]))
    .unwrap();
    assert_eq!(args.name, "sshd");
    assert_eq!(args.state.unwrap(), "running");
    assert_eq!(args.user.unwrap(), "root");
    assert_eq!(args.manager.unwrap(), Manager::Systemd);
    assert_eq!(args.config_path.unwrap().to_str().unwrap(), "/some/path");
    assert_eq!(args.log_level.unwrap(), LevelFilter::Debug);
}

#[test]
fn parse_args_empty_inline_value() {
    let args = parse_args(args(&["-name", "sshd", "-state="])).unwrap();
    assert_eq!(args.state.unwrap(), "");
}

#[test]
fn parse_args_no_args_is_help() {
    match parse_args(args(&[])) {
        Err(Error::Usage { message }) => assert!(message.is_none()),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_help() {
    match parse_args(args(&["-name", "sshd", "--help"])) {
        Err(Error::Usage { message }) => assert!(message.is_none()),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_missing_name() {
    match parse_args(args(&["-state", "running"])) {
        Err(Error::Usage { message }) => assert!(message.unwrap().contains("-name")),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_empty_name() {
    assert!(parse_args(args(&["-name="])).is_err());
}

#[test]
fn parse_args_missing_value() {
    match parse_args(args(&["-name", "sshd", "-user"])) {
        Err(Error::Usage { message }) => {
            assert_eq!(message.unwrap(), "Did not give argument to -user")
        }
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_unexpected() {
    match parse_args(args(&["-name", "sshd", "extra"])) {
        Err(Error::Usage { message }) => assert!(message.unwrap().contains("extra")),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn split_flag_forms() {
    assert_eq!(split_flag("-name"), Some(("name", None)));
    assert_eq!(split_flag("--name=sshd"), Some(("name", Some("sshd"))));
    assert_eq!(split_flag("-state=a=b"), Some(("state", Some("a=b"))));
    assert_eq!(split_flag("name"), None);
}

#[test]
fn parse_args_bad_log_level() {
    let result = parse_args(args(&["-name", "sshd", "--log-level", "loud"]));
    assert!(matches!(result, Err(Error::LogLevel { .. })));
}

#[test]
fn parse_args_bad_manager() {
    let result = parse_args(args(&["-name", "sshd", "-manager", "upstart"]));
    assert!(matches!(result, Err(Error::Usage { .. })));
}
