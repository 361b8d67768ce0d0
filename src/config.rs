//! # Publisher configuration.
//!
//! Provides [`Config`], the settings for one execution run, and the
//! environment loader [`Config::from_env`].
//!
//! ## Recognized variables
//! ```text
//! PROGRESS_NOTEBOOK_ID_KEY     name of the variable holding the notebook id (default NOTEBOOK_ID)
//! <notebook id key>            notebook id                                   (required)
//! PROGRESS_SUBJECT             publish subject (default notebook.progress)
//! PROGRESS_BUS_URL             bus URL                                       (required)
//! PROGRESS_BUS_USER            bus user                                      (required)
//! PROGRESS_BUS_PASSWORD        bus password                                  (required)
//! PROGRESS_DEBUG               1/true/yes/on enables verbose diagnostics
//! PROGRESS_RECONNECT_ATTEMPTS  reconnect failure budget for the run (default 3)
//! PROGRESS_SHUTDOWN_GRACE_MS   shutdown grace in milliseconds (default 5000)
//! ```
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for the worker at all on shutdown

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::policies::ReconnectPolicy;
use crate::transport::Endpoint;

/// Variable overriding the name of the notebook id variable.
pub const NOTEBOOK_ID_KEY_VAR: &str = "PROGRESS_NOTEBOOK_ID_KEY";
/// Default name of the variable holding the notebook id.
pub const DEFAULT_NOTEBOOK_ID_KEY: &str = "NOTEBOOK_ID";
/// Variable overriding the publish subject.
pub const SUBJECT_VAR: &str = "PROGRESS_SUBJECT";
/// Default publish subject.
pub const DEFAULT_SUBJECT: &str = "notebook.progress";
/// Variable holding the bus URL (required).
pub const BUS_URL_VAR: &str = "PROGRESS_BUS_URL";
/// Variable holding the bus user (required).
pub const BUS_USER_VAR: &str = "PROGRESS_BUS_USER";
/// Variable holding the bus password (required).
pub const BUS_PASSWORD_VAR: &str = "PROGRESS_BUS_PASSWORD";
/// Variable enabling verbose diagnostics.
pub const DEBUG_VAR: &str = "PROGRESS_DEBUG";
/// Variable overriding the reconnect failure budget.
pub const RECONNECT_ATTEMPTS_VAR: &str = "PROGRESS_RECONNECT_ATTEMPTS";
/// Variable overriding the shutdown grace, in milliseconds.
pub const SHUTDOWN_GRACE_VAR: &str = "PROGRESS_SHUTDOWN_GRACE_MS";

/// Configuration for one execution run.
///
/// ## Field semantics
/// - `notebook_id`: stamped on every event
/// - `subject`: bus subject every event is published to
/// - `endpoint`: where and as whom to connect
/// - `debug`: log every payload at `info` instead of `trace`
/// - `reconnect`: bounded reconnect budget and pacing
/// - `grace`: how long `shutdown` waits for the worker (`0s` = no wait)
#[derive(Clone, Debug)]
pub struct Config {
    /// Identifier of the notebook being executed.
    pub notebook_id: String,
    /// Subject progress events are published to.
    pub subject: String,
    /// Bus endpoint and credentials.
    pub endpoint: Endpoint,
    /// Verbose diagnostics toggle.
    pub debug: bool,
    /// Consecutive failure budget for the run.
    pub reconnect: ReconnectPolicy,
    /// Maximum time the caller waits for the worker to stop.
    pub grace: Duration,
}

impl Config {
    /// Creates a configuration with defaults for everything except the
    /// notebook id and endpoint.
    pub fn new(notebook_id: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            subject: DEFAULT_SUBJECT.to_string(),
            endpoint,
            debug: false,
            reconnect: ReconnectPolicy::default(),
            grace: Duration::from_secs(5),
        }
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary lookup function.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| ConfigError::Missing {
                key: key.to_string(),
            })
        };

        let id_key =
            get(NOTEBOOK_ID_KEY_VAR).unwrap_or_else(|| DEFAULT_NOTEBOOK_ID_KEY.to_string());
        let notebook_id = require(id_key.as_str())?;
        let endpoint = Endpoint {
            url: require(BUS_URL_VAR)?,
            user: require(BUS_USER_VAR)?,
            password: SecretString::from(require(BUS_PASSWORD_VAR)?),
        };

        let mut cfg = Config::new(notebook_id, endpoint);
        if let Some(subject) = get(SUBJECT_VAR) {
            cfg.subject = subject;
        }
        if let Some(raw) = get(DEBUG_VAR) {
            cfg.debug = parse_flag(DEBUG_VAR, &raw)?;
        }
        if let Some(raw) = get(RECONNECT_ATTEMPTS_VAR) {
            let n = parse_number(RECONNECT_ATTEMPTS_VAR, &raw)?;
            cfg.reconnect.max_attempts = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(raw) = get(SHUTDOWN_GRACE_VAR) {
            cfg.grace = Duration::from_millis(parse_number(SHUTDOWN_GRACE_VAR, &raw)?);
        }
        Ok(cfg)
    }

    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → do not wait for the worker
    /// - `Some(d)` → wait at most `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean flag".to_string(),
        }),
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("NOTEBOOK_ID", "nb-42"),
        (BUS_URL_VAR, "nats://bus:4222"),
        (BUS_USER_VAR, "runner"),
        (BUS_PASSWORD_VAR, "hunter2"),
    ];

    #[test]
    fn defaults_apply_when_only_required_are_set() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.notebook_id, "nb-42");
        assert_eq!(cfg.subject, DEFAULT_SUBJECT);
        assert_eq!(cfg.endpoint.url, "nats://bus:4222");
        assert_eq!(cfg.endpoint.password.expose_secret(), "hunter2");
        assert!(!cfg.debug);
        assert_eq!(cfg.reconnect.max_attempts, 3);
        assert_eq!(cfg.shutdown_grace(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn notebook_id_key_can_be_redirected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "NOTEBOOK_ID");
        pairs.push((NOTEBOOK_ID_KEY_VAR, "JOB_NAME"));
        pairs.push(("JOB_NAME", "etl-7"));

        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.notebook_id, "etl-7");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((SUBJECT_VAR, "jobs.progress"));
        pairs.push((DEBUG_VAR, "Yes"));
        pairs.push((RECONNECT_ATTEMPTS_VAR, "5"));
        pairs.push((SHUTDOWN_GRACE_VAR, "0"));

        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.subject, "jobs.progress");
        assert!(cfg.debug);
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert_eq!(cfg.shutdown_grace(), None);
    }

    #[test]
    fn missing_and_empty_required_values_fail() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != BUS_USER_VAR);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: BUS_USER_VAR.to_string()
            }
        );

        let pairs = [
            ("NOTEBOOK_ID", "nb-42"),
            (BUS_URL_VAR, "nats://bus:4222"),
            (BUS_USER_VAR, "runner"),
            (BUS_PASSWORD_VAR, "  "),
        ];
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((DEBUG_VAR, "maybe"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");

        let mut pairs = REQUIRED.to_vec();
        pairs.push((SHUTDOWN_GRACE_VAR, "-1"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
