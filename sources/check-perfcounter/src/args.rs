use crate::error::{self, Error, Result};
use log::LevelFilter;
use snafu::{OptionExt, ResultExt};
use std::str::FromStr;

const DEFAULT_POLLING_ATTEMPTS: i64 = 2;
const DEFAULT_POLLING_DELAY: i64 = 1;

#[derive(Debug)]
pub(crate) struct Arguments {
    pub(crate) counter_name: String,
    pub(crate) polling_attempts: i64,
    pub(crate) polling_delay: i64,
    pub(crate) warning: Option<f64>,
    pub(crate) critical: Option<f64>,
    pub(crate) greater_than: bool,
    pub(crate) log_level: Option<LevelFilter>,
}

/// The usage message for --help.
pub(crate) const USAGE: &str = r"USAGE:
check-perfcounter -counter_name <counter> [ other options ]
  Sample a performance counter through PowerShell's Get-Counter and compare the average against
  warning and critical thresholds.

OPTIONS:
    -counter_name <counter>      Required. e.g. '\Processor(_Total)\% Processor Time'
    [ -polling_attempts <n> ]    How many samples to take. Defaults to 2.
    [ -polling_delay <seconds> ] Seconds between samples. Defaults to 1.
    [ -warning <value> ]         Threshold for a WARNING result.
    [ -critical <value> ]        Threshold for a CRITICAL result.
    [ -greater_than ]            Alert when the value is above the thresholds instead of below.
    [ --log-level <level> ]      off, error, warn, info, debug, or trace. Logs go to stderr.
";

/// Parses the command line arguments.
pub(crate) fn parse_args<A>(args: A) -> Result<Arguments>
where
    A: Iterator<Item = String>,
{
    let mut counter_name = None;
    let mut polling_attempts = None;
    let mut polling_delay = None;
    let mut warning = None;
    let mut critical = None;
    let mut greater_than = false;
    let mut log_level = None;
    let mut iter = args.skip(1).peekable();

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
            "counter_name" => counter_name = Some(value(flag, inline_value, &mut iter)?),
            "polling_attempts" => {
                let value = value(flag, inline_value, &mut iter)?;
                polling_attempts = Some(value.parse::<i64>().context(error::IntParse { value })?);
            }
            "polling_delay" => {
                let value = value(flag, inline_value, &mut iter)?;
                polling_delay = Some(value.parse::<i64>().context(error::IntParse { value })?);
            }
            "warning" => warning = Some(parse_float(value(flag, inline_value, &mut iter)?)?),
            "critical" => critical = Some(parse_float(value(flag, inline_value, &mut iter)?)?),
            "greater_than" if inline_value.is_none() => greater_than = true,
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

    Ok(Arguments {
        counter_name: counter_name.context(error::Usage {
            message: String::from("The -counter_name option is required"),
        })?,
        polling_attempts: polling_attempts.unwrap_or(DEFAULT_POLLING_ATTEMPTS),
        polling_delay: polling_delay.unwrap_or(DEFAULT_POLLING_DELAY),
        warning,
        critical,
        greater_than,
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

fn parse_float(value: String) -> Result<f64> {
    value.parse::<f64>().context(error::FloatParse { value })
}

#[cfg(test)]
fn args(raw: &[&str]) -> impl Iterator<Item = String> {
    std::iter::once(String::from("/bin/check-perfcounter"))
        .chain(raw.iter().map(|&s| s.to_owned()))
        .collect::<Vec<String>>()
        .into_iter()
}

#[test]
fn parse_args_defaults() {
    let args = parse_args(args(&["-counter_name", r"\Memory\Available MBytes"])).unwrap();
    assert_eq!(args.counter_name, r"\Memory\Available MBytes");
    assert_eq!(args.polling_attempts, 2);
    assert_eq!(args.polling_delay, 1);
    assert!(args.warning.is_none());
    assert!(args.critical.is_none());
    assert!(!args.greater_than);
    assert!(args.log_level.is_none());
}

#[test]
fn parse_args_all_options() {
    let args = parse_args(args(&[
        "-counter_name",
        r"\Processor(_Total)\% Processor Time",
        "-polling_attempts",
        "5",
        "--polling_delay",
        "3",
        "-warning",
        "80",
        "-critical",
        "95.5",
        "-greater_than",
        "--log-level",
        "trace",
    ]))
    .unwrap();
    assert_eq!(args.polling_attempts, 5);
    assert_eq!(args.polling_delay, 3);
    assert_eq!(args.warning, Some(80.0));
    assert_eq!(args.critical, Some(95.5));
    assert!(args.greater_than);
    assert_eq!(args.log_level, Some(LevelFilter::Trace));
}

#[test]
fn parse_args_missing_counter() {
    match parse_args(args(&["-warning", "1"])) {
        Err(Error::Usage { message }) => assert!(message.unwrap().contains("-counter_name")),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_bad_threshold() {
    let result = parse_args(args(&["-counter_name", "x", "-warning", "high"]));
    assert!(matches!(result, Err(Error::FloatParse { .. })));
}

#[test]
fn parse_args_bad_attempts() {
    let result = parse_args(args(&["-counter_name", "x", "-polling_attempts", "two"]));
    assert!(matches!(result, Err(Error::IntParse { .. })));
}

#[test]
fn parse_args_no_args_is_help() {
    match parse_args(args(&[])) {
        Err(Error::Usage { message }) => assert!(message.is_none()),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}

#[test]
fn parse_args_inline_values() {
    let args = parse_args(args(&[
        r"-counter_name=\Memory\Available MBytes",
        "--polling_attempts=4",
        "-warning=512",
        "--critical=256.5",
        "--log-level=warn",
    ]))
    .unwrap();
    assert_eq!(args.counter_name, r"\Memory\Available MBytes");
    assert_eq!(args.polling_attempts, 4);
    assert_eq!(args.polling_delay, 1);
    assert_eq!(args.warning, Some(512.0));
    assert_eq!(args.critical, Some(256.5));
    assert_eq!(args.log_level, Some(LevelFilter::Warn));
}

#[test]
fn parse_args_rejects_bare_words() {
    match parse_args(args(&["-counter_name", "x", "extra"])) {
        Err(Error::Usage { message }) => assert!(message.unwrap().contains("extra")),
        other => panic!("expected Error::Usage, got {:?}", other),
    }
}
