use crate::error::{self, Result};
use crate::service_info::{ServiceInfo, ServiceInfoSource};
use nagiosplugin::ServiceState;
use snafu::OptionExt;

fn state_for(matched: bool) -> ServiceState {
    if matched {
        ServiceState::Ok
    } else {
        ServiceState::Critical
    }
}

/// The line to print and the status to exit with.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckResult {
    pub(crate) message: String,
    pub(crate) status: ServiceState,
}

/// What the service is expected to look like. Empty state or user means that field is not
/// checked.
pub(crate) struct ServiceQuery {
    desired_name: String,
    desired_state: String,
    desired_user: String,
    source: Option<Box<dyn ServiceInfoSource>>,
}

impl ServiceQuery {
    pub(crate) fn new<S1, S2, S3>(name: S1, state: S2, user: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            desired_name: name.into(),
            desired_state: state.into(),
            desired_user: user.into(),
            source: None,
        }
    }

    /// Sets where the actual service information comes from.
    pub(crate) fn with_source(mut self, source: Box<dyn ServiceInfoSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Looks up the service once. The query is consumed, so the actual values can't change after
    /// this, and a failed lookup leaves nothing to classify.
    pub(crate) fn acquire_actual(self) -> Result<ServiceStatus> {
        let source = self.source.as_ref().context(error::NoServiceInfoHandler {
            service: self.desired_name.as_str(),
        })?;
        let actual = source.service_info(&self.desired_name)?;
        Ok(ServiceStatus {
            desired_name: self.desired_name,
            desired_state: self.desired_state,
            desired_user: self.desired_user,
            actual,
        })
    }
}

/// The desired service next to what was actually found.
#[derive(Debug)]
pub(crate) struct ServiceStatus {
    desired_name: String,
    desired_state: String,
    desired_user: String,
    actual: ServiceInfo,
}

impl ServiceStatus {
    pub(crate) fn actual_name(&self) -> &str {
        &self.actual.name
    }

    pub(crate) fn actual_state(&self) -> &str {
        &self.actual.state
    }

    pub(crate) fn actual_user(&self) -> &str {
        &self.actual.user
    }

    /// Case insensitive match against the actual name.
    pub(crate) fn is_name(&self, name: &str) -> bool {
        equal_fold(self.actual_name(), name)
    }

    /// Case insensitive match against the actual state.
    pub(crate) fn is_state(&self, state: &str) -> bool {
        equal_fold(self.actual_state(), state)
    }

    /// Case insensitive match against the actual user.
    pub(crate) fn is_user(&self, user: &str) -> bool {
        equal_fold(self.actual_user(), user)
    }

    /// Compares the desired service against the actual one. The first matching rule decides:
    ///
    /// 1. a different name means the service does not exist
    /// 2. with both state and user given, both must match
    /// 3. with only state given, the state must match
    /// 4. with only user given, the user must match
    /// 5. with neither, existing is enough
    ///
    /// Critical results carry the actual name, state and user on the end.
    pub(crate) fn classify(&self) -> CheckResult {
        let check_state = !self.desired_state.is_empty();
        let check_user = !self.desired_user.is_empty();

        let (check_info, status) = if !self.is_name(&self.desired_name) {
            (
                format!("{} does not exist", self.desired_name),
                ServiceState::Critical,
            )
        } else if check_state && check_user {
            let matched = self.is_state(&self.desired_state) && self.is_user(&self.desired_user);
            let check_info = if matched {
                format!(
                    "{} in a {} state and started by user {}",
                    self.actual_name(),
                    self.actual_state(),
                    self.actual_user()
                )
            } else {
                format!(
                    "{} either not in a {} state or not started by user {}",
                    self.actual_name(),
                    self.desired_state,
                    self.desired_user
                )
            };
            (check_info, state_for(matched))
        } else if check_state {
            let matched = self.is_state(&self.desired_state);
            let check_info = if matched {
                format!("{} in a {} state", self.actual_name(), self.actual_state())
            } else {
                format!("{} not in a {} state", self.actual_name(), self.desired_state)
            };
            (check_info, state_for(matched))
        } else if check_user {
            let matched = self.is_user(&self.desired_user);
            let check_info = if matched {
                format!("{} started by user {}", self.actual_name(), self.actual_user())
            } else {
                format!("{} not started by user {}", self.actual_name(), self.desired_user)
            };
            (check_info, state_for(matched))
        } else {
            (
                format!(
                    "{} in a {} state and started by user {}",
                    self.actual_name(),
                    self.actual_state(),
                    self.actual_user()
                ),
                ServiceState::Ok,
            )
        };

        let message = if status == ServiceState::Ok {
            format!("CheckService {} - {}", status, check_info)
        } else {
            format!(
                "CheckService {} - {} (Name: {}, State: {}, User: {})",
                status,
                check_info,
                self.actual_name(),
                self.actual_state(),
                self.actual_user()
            )
        };
        CheckResult { message, status }
    }
}

/// Equality under Unicode case folding.
fn equal_fold(a: &str, b: &str) -> bool {
    unicase::eq(a, b)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn info(name: &str, state: &str, user: &str) -> ServiceInfo {
        ServiceInfo {
            name: name.to_string(),
            state: state.to_string(),
            user: user.to_string(),
        }
    }

    /// Runs a query against a source that always reports `actual`.
    fn status(desired: (&str, &str, &str), actual: ServiceInfo) -> ServiceStatus {
        let (name, state, user) = desired;
        ServiceQuery::new(name, state, user)
            .with_source(Box::new(move |_: &str| -> Result<ServiceInfo> {
                Ok(actual.clone())
            }))
            .acquire_actual()
            .unwrap()
    }

    fn classify(desired: (&str, &str, &str), actual: (&str, &str, &str)) -> CheckResult {
        status(desired, info(actual.0, actual.1, actual.2)).classify()
    }

    #[test]
    fn running_state_matches() {
        let result = classify(("sshd", "running", ""), ("sshd", "running", "root"));
        assert_eq!(
            result,
            CheckResult {
                message: String::from("CheckService OK - sshd in a running state"),
                status: ServiceState::Ok,
            }
        );
        assert_eq!(result.status.exit_code(), 0);
    }

    #[test]
    fn stopped_state_does_not_match() {
        let result = classify(("sshd", "stopped", ""), ("sshd", "running", "root"));
        assert_eq!(
            result.message,
            "CheckService CRITICAL - sshd not in a stopped state (Name: sshd, State: running, User: root)"
        );
        assert_eq!(result.status.exit_code(), 2);
    }

    #[test]
    fn missing_service() {
        let desired = [
            ("sshd", "", ""),
            ("sshd", "running", ""),
            ("sshd", "", "root"),
            ("sshd", "running", "root"),
        ];
        for &d in desired.iter() {
            for &actual in [("", "", ""), ("ssh", "running", "root")].iter() {
                let result = classify(d, actual);
                assert_eq!(result.status, ServiceState::Critical);
                assert!(
                    result.message.starts_with("CheckService CRITICAL - sshd does not exist ("),
                    "{}",
                    result.message
                );
            }
        }
        assert_eq!(
            classify(("nosuch", "", ""), ("", "", "")).message,
            "CheckService CRITICAL - nosuch does not exist (Name: , State: , User: )"
        );
    }

    #[test]
    fn existence_only() {
        let actuals = [
            ("sshd", "running", "root"),
            ("SSHD", "stopped", ""),
            ("sshd", "", ""),
        ];
        for &actual in actuals.iter() {
            assert_eq!(classify(("sshd", "", ""), actual).status, ServiceState::Ok);
        }
        assert_eq!(
            classify(("sshd", "", ""), ("sshd", "running", "root")).message,
            "CheckService OK - sshd in a running state and started by user root"
        );
    }

    #[test]
    fn state_only() {
        let desired = ("sshd", "running", "");
        assert_eq!(classify(desired, ("sshd", "RUNNING", "x")).status, ServiceState::Ok);
        assert_eq!(
            classify(desired, ("sshd", "stopped", "root")).status,
            ServiceState::Critical
        );
        assert_eq!(classify(desired, ("sshd", "", "root")).status, ServiceState::Critical);
    }

    #[test]
    fn user_only() {
        let ok = classify(("sshd", "", "Root"), ("sshd", "stopped", "root"));
        assert_eq!(ok.status, ServiceState::Ok);
        assert_eq!(ok.message, "CheckService OK - sshd started by user root");

        let critical = classify(("sshd", "", "nobody"), ("sshd", "running", "root"));
        assert_eq!(critical.status, ServiceState::Critical);
        assert_eq!(
            critical.message,
            "CheckService CRITICAL - sshd not started by user nobody (Name: sshd, State: running, User: root)"
        );
    }

    #[test]
    fn state_and_user() {
        let ok = classify(("sshd", "running", "root"), ("sshd", "Running", "ROOT"));
        assert_eq!(ok.status, ServiceState::Ok);
        assert_eq!(
            ok.message,
            "CheckService OK - sshd in a Running state and started by user ROOT"
        );

        let mismatches = [
            ("sshd", "stopped", "root"),
            ("sshd", "running", "nobody"),
            ("sshd", "stopped", "nobody"),
        ];
        for &actual in mismatches.iter() {
            let result = classify(("sshd", "running", "root"), actual);
            assert_eq!(result.status, ServiceState::Critical);
            assert!(result.message.starts_with(
                "CheckService CRITICAL - sshd either not in a running state or not started by \
                 user root (Name: sshd, State: "
            ));
        }
    }

    #[test]
    fn predicates_ignore_case() {
        let status = status(("sshd", "", ""), info("sshd", "running", "Root"));
        assert!(status.is_state("Running"));
        assert!(status.is_name("SSHD"));
        assert!(status.is_user("root"));
        assert!(!status.is_user("roo"));
        assert!(!status.is_state(""));
    }

    #[test]
    fn unicode_case_folding() {
        assert!(equal_fold("Dienstüberwachung", "DIENSTÜBERWACHUNG"));
        assert!(equal_fold("ſshd", "sshd"));
        assert!(equal_fold("ΟΔΟΣ", "οδος"));
        assert!(equal_fold("ΟΔΟΣ", "οδος".replace('σ', "ς").as_str()));
        assert!(!equal_fold("a", "ab"));
    }

    #[test]
    fn acquires_once_with_desired_name() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        let status = ServiceQuery::new("sshd", "", "")
            .with_source(Box::new(move |name: &str| -> Result<ServiceInfo> {
                seen.borrow_mut().push(name.to_string());
                Ok(info("sshd", "running", "root"))
            }))
            .acquire_actual()
            .unwrap();
        assert_eq!(*calls.borrow(), vec![String::from("sshd")]);
        assert_eq!(status.actual_name(), "sshd");
        assert_eq!(status.actual_state(), "running");
        assert_eq!(status.actual_user(), "root");
    }

    #[test]
    fn no_source() {
        match ServiceQuery::new("sshd", "running", "").acquire_actual() {
            Err(Error::NoServiceInfoHandler { service }) => assert_eq!(service, "sshd"),
            other => panic!("expected Error::NoServiceInfoHandler, got {:?}", other),
        }
    }

    #[test]
    fn source_error_is_forwarded() {
        let result = ServiceQuery::new("sshd", "running", "")
            .with_source(Box::new(|_: &str| -> Result<ServiceInfo> {
                Err(Error::ServiceCommandStatus {
                    command: String::from("systemctl"),
                    code: 1,
                    stderr: String::from("Failed to connect to bus"),
                })
            }))
            .acquire_actual();
        match result {
            Err(Error::ServiceCommandStatus { stderr, .. }) => {
                assert_eq!(stderr, "Failed to connect to bus")
            }
            other => panic!("expected Error::ServiceCommandStatus, got {:?}", other),
        }
    }
}
