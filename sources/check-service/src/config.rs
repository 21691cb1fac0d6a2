use crate::args::Arguments;
use crate::error::{self, Error, Result};
use serde::Deserialize;
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SYSTEMCTL: &str = "systemctl";
const DEFAULT_PS: &str = "ps";

/// The local service manager that is asked about the service.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Manager {
    Systemd,
    Windows,
}

impl Manager {
    pub(crate) fn parse<S: AsRef<str>>(s: S) -> Result<Self> {
        match s.as_ref().to_lowercase().as_str() {
            "systemd" => Ok(Manager::Systemd),
            "windows" => Ok(Manager::Windows),
            _ => Err(Error::Usage {
                message: Some(format!("Unknown service manager: '{}'", s.as_ref())),
            }),
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        if cfg!(windows) {
            Manager::Windows
        } else {
            Manager::Systemd
        }
    }
}

/// The optional TOML config file. Anything given on the command line takes precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) manager: Option<Manager>,
    pub(crate) systemctl_path: Option<PathBuf>,
    pub(crate) ps_path: Option<PathBuf>,
    pub(crate) powershell_path: Option<PathBuf>,
}

impl Config {
    pub(crate) fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let path = file.as_ref();
        let contents = fs::read_to_string(path).context(error::ConfigRead { path })?;
        toml::from_str(&contents).context(error::ConfigParse { path })
    }
}

/// Everything a single check needs, assembled once from the arguments and the config file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct Settings {
    pub(crate) name: String,
    /// Empty when the state is not checked.
    pub(crate) state: String,
    /// Empty when the user is not checked.
    pub(crate) user: String,
    pub(crate) manager: Manager,
    pub(crate) systemctl_path: PathBuf,
    pub(crate) ps_path: PathBuf,
    /// When absent, PowerShell is looked up on `PATH`.
    pub(crate) powershell_path: Option<PathBuf>,
}

impl Settings {
    pub(crate) fn new(arguments: Arguments, config: Config) -> Self {
        Self {
            name: arguments.name,
            state: arguments.state.unwrap_or_default(),
            user: arguments.user.unwrap_or_default(),
            manager: arguments
                .manager
                .or(config.manager)
                .unwrap_or_default(),
            systemctl_path: config
                .systemctl_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSTEMCTL)),
            ps_path: config.ps_path.unwrap_or_else(|| PathBuf::from(DEFAULT_PS)),
            powershell_path: config.powershell_path,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn arguments(manager: Option<Manager>) -> Arguments {
        Arguments {
            name: String::from("sshd"),
            state: Some(String::from("running")),
            user: None,
            manager,
            config_path: None,
            log_level: None,
        }
    }

    #[test]
    fn parse_config() {
        let config: Config = toml::from_str(
            r#"
            manager = "windows"
            systemctl-path = "/usr/bin/systemctl"
            ps-path = "/bin/ps"
            powershell-path = "C:\\pwsh.exe"
            "#,
        )
        .unwrap();
        assert_eq!(config.manager, Some(Manager::Windows));
        assert_eq!(config.systemctl_path.unwrap(), PathBuf::from("/usr/bin/systemctl"));
        assert_eq!(config.ps_path.unwrap(), PathBuf::from("/bin/ps"));
        assert_eq!(config.powershell_path.unwrap(), PathBuf::from("C:\\pwsh.exe"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(toml::from_str::<Config>("metrics_url = \"http://localhost\"").is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let settings = Settings::new(arguments(None), toml::from_str("").unwrap());
        assert_eq!(settings.name, "sshd");
        assert_eq!(settings.state, "running");
        assert_eq!(settings.user, "");
        assert_eq!(settings.manager, Manager::default());
        assert_eq!(settings.systemctl_path, PathBuf::from("systemctl"));
        assert_eq!(settings.ps_path, PathBuf::from("ps"));
        assert!(settings.powershell_path.is_none());
    }

    #[test]
    fn arguments_win_over_config() {
        let config = Config {
            manager: Some(Manager::Windows),
            ..Config::default()
        };
        let settings = Settings::new(arguments(Some(Manager::Systemd)), config);
        assert_eq!(settings.manager, Manager::Systemd);
    }

    #[test]
    fn config_fills_in_missing_arguments() {
        let config = Config {
            manager: Some(Manager::Windows),
            ..Config::default()
        };
        let settings = Settings::new(arguments(None), config);
        assert_eq!(settings.manager, Manager::Windows);
    }

    #[test]
    fn parse_manager() {
        assert_eq!(Manager::parse("systemd").unwrap(), Manager::Systemd);
        assert_eq!(Manager::parse("Windows").unwrap(), Manager::Windows);
        match Manager::parse("upstart") {
            Err(Error::Usage { message }) => assert!(message.unwrap().contains("upstart")),
            other => panic!("expected Error::Usage, got {:?}", other),
        }
    }
}
