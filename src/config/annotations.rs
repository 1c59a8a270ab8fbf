use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

/// Controls whether a monitor is created for an ingress or not.
pub const ENABLED: &str = "ingress-monitor.bonial.com/enabled";
/// Forces the monitor to use HTTPS if set to "true".
pub const FORCE_HTTPS: &str = "ingress-monitor.bonial.com/force-https";
/// Custom path that should be monitored, e.g. "/health".
pub const PATH_OVERRIDE: &str = "ingress-monitor.bonial.com/path-override";

pub const NGINX_FORCE_SSL_REDIRECT: &str = "nginx.ingress.kubernetes.io/force-ssl-redirect";
pub const NGINX_WHITELIST_SOURCE_RANGE: &str = "nginx.ingress.kubernetes.io/whitelist-source-range";

/// Custom alert actions as a json array, e.g.
/// `[{"action_id":"123","alert_type":0}]`.
pub const SITE24X7_ACTIONS: &str = "site24x7.ingress-monitor.bonial.com/actions";
pub const SITE24X7_AUTH_PASS: &str = "site24x7.ingress-monitor.bonial.com/auth-pass";
pub const SITE24X7_AUTH_USER: &str = "site24x7.ingress-monitor.bonial.com/auth-user";
pub const SITE24X7_CHECK_FREQUENCY: &str = "site24x7.ingress-monitor.bonial.com/check-frequency";
/// Additional HTTP headers as a json array, e.g.
/// `[{"name":"Content-Type","value":"application/json"}]`.
pub const SITE24X7_CUSTOM_HEADERS: &str = "site24x7.ingress-monitor.bonial.com/custom-headers";
pub const SITE24X7_HTTP_METHOD: &str = "site24x7.ingress-monitor.bonial.com/http-method";
pub const SITE24X7_LOCATION_PROFILE_ID: &str = "site24x7.ingress-monitor.bonial.com/location-profile-id";
pub const SITE24X7_MATCH_CASE: &str = "site24x7.ingress-monitor.bonial.com/match-case";
/// Comma separated list of monitor group IDs.
pub const SITE24X7_MONITOR_GROUP_IDS: &str = "site24x7.ingress-monitor.bonial.com/monitor-group-ids";
pub const SITE24X7_NOTIFICATION_PROFILE_ID: &str = "site24x7.ingress-monitor.bonial.com/notification-profile-id";
pub const SITE24X7_THRESHOLD_PROFILE_ID: &str = "site24x7.ingress-monitor.bonial.com/threshold-profile-id";
/// Connection timeout in seconds, 1-45.
pub const SITE24X7_TIMEOUT: &str = "site24x7.ingress-monitor.bonial.com/timeout";
pub const SITE24X7_USE_NAME_SERVER: &str = "site24x7.ingress-monitor.bonial.com/use-name-server";
pub const SITE24X7_USER_AGENT: &str = "site24x7.ingress-monitor.bonial.com/user-agent";
/// Comma separated list of user group IDs.
pub const SITE24X7_USER_GROUP_IDS: &str = "site24x7.ingress-monitor.bonial.com/user-group-ids";

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("invalid json in annotation {name:?}: {value}: {source}")]
    InvalidJson {
        name: String,
        value: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read view over the annotations of a single ingress snapshot. Lookups of
/// missing annotations fall back to the provided defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct Annotations<'a> {
    map: Option<&'a BTreeMap<String, String>>,
}

impl<'a> Annotations<'a> {
    pub fn new(map: Option<&'a BTreeMap<String, String>>) -> Self {
        Self { map }
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.map.and_then(|map| map.get(name)).map(String::as_str)
    }

    pub fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_owned()
    }

    /// Splits the annotation value on commas. Empty or missing values yield
    /// the default.
    pub fn string_slice(&self, name: &str, default: &[String]) -> Vec<String> {
        match self.get(name) {
            Some(value) if !value.is_empty() => value.split(',').map(str::to_owned).collect(),
            _ => default.to_vec(),
        }
    }

    /// Unparsable values are logged and read as `false`.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        let Some(value) = self.get(name) else {
            return default;
        };

        parse_bool(value).unwrap_or_else(|| {
            error!("invalid bool value in annotation {name:?}: {value}");
            false
        })
    }

    /// Unparsable values are logged and read as `0`.
    pub fn int(&self, name: &str, default: i64) -> i64 {
        let Some(value) = self.get(name) else {
            return default;
        };

        value.parse().unwrap_or_else(|_| {
            error!("invalid int value in annotation {name:?}: {value}");
            0
        })
    }

    /// Returns `Ok(None)` if the annotation is absent.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AnnotationError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };

        serde_json::from_str(value).map(Some).map_err(|source| AnnotationError::InvalidJson {
            name: name.to_owned(),
            value: value.to_owned(),
            source,
        })
    }

    pub fn is_monitor_enabled(&self) -> bool {
        self.bool(ENABLED, false)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
