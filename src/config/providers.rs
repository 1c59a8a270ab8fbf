use std::path::Path;

use serde::Deserialize;

use super::ConfigError;
use crate::provider::site24x7::api::{ActionRef, Header};

/// Uses Site24x7 for managing ingress monitors.
pub const PROVIDER_SITE24X7: &str = "site24x7";
/// Only logs monitor operations. Meant for testing.
pub const PROVIDER_NULL: &str = "null";

/// Configuration of all supported monitor providers. Every field missing from
/// a config file keeps its default value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub site24x7: Site24x7Config,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Site24x7Config {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "monitorDefaults")]
    pub monitor_defaults: Site24x7MonitorDefaults,
}

impl std::fmt::Debug for Site24x7Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site24x7Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("monitor_defaults", &self.monitor_defaults)
            .finish()
    }
}

impl Default for Site24x7Config {
    fn default() -> Self {
        Self {
            client_id: std::env::var("SITE24X7_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("SITE24X7_CLIENT_SECRET").unwrap_or_default(),
            refresh_token: std::env::var("SITE24X7_REFRESH_TOKEN").unwrap_or_default(),
            monitor_defaults: Site24x7MonitorDefaults::default(),
        }
    }
}

/// Applied to every monitor unless overridden by an ingress annotation.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Site24x7MonitorDefaults {
    pub auto_location_profile: bool,
    pub auto_notification_profile: bool,
    pub auto_threshold_profile: bool,
    pub auto_monitor_group: bool,
    pub auto_user_group: bool,
    pub match_case: bool,
    pub timeout: i64,
    pub check_frequency: String,
    pub http_method: String,
    pub auth_user: String,
    pub auth_pass: String,
    pub user_agent: String,
    pub use_name_server: bool,
    #[serde(rename = "locationProfileID")]
    pub location_profile_id: String,
    #[serde(rename = "notificationProfileID")]
    pub notification_profile_id: String,
    #[serde(rename = "thresholdProfileID")]
    pub threshold_profile_id: String,
    #[serde(rename = "monitorGroupIDs")]
    pub monitor_group_ids: Vec<String>,
    #[serde(rename = "userGroupIDs")]
    pub user_group_ids: Vec<String>,
    pub actions: Vec<ActionRef>,
    pub custom_headers: Vec<Header>,
}

impl std::fmt::Debug for Site24x7MonitorDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site24x7MonitorDefaults")
            .field("auto_location_profile", &self.auto_location_profile)
            .field("auto_notification_profile", &self.auto_notification_profile)
            .field("auto_threshold_profile", &self.auto_threshold_profile)
            .field("auto_monitor_group", &self.auto_monitor_group)
            .field("auto_user_group", &self.auto_user_group)
            .field("match_case", &self.match_case)
            .field("timeout", &self.timeout)
            .field("check_frequency", &self.check_frequency)
            .field("http_method", &self.http_method)
            .field("auth_user", &self.auth_user)
            .field("auth_pass", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("use_name_server", &self.use_name_server)
            .field("location_profile_id", &self.location_profile_id)
            .field("notification_profile_id", &self.notification_profile_id)
            .field("threshold_profile_id", &self.threshold_profile_id)
            .field("monitor_group_ids", &self.monitor_group_ids)
            .field("user_group_ids", &self.user_group_ids)
            .field("actions", &self.actions)
            .field("custom_headers", &self.custom_headers)
            .finish()
    }
}

impl Default for Site24x7MonitorDefaults {
    fn default() -> Self {
        Self {
            auto_location_profile: true,
            auto_notification_profile: true,
            auto_threshold_profile: true,
            auto_monitor_group: true,
            auto_user_group: true,
            match_case: false,
            timeout: 10,
            check_frequency: "1".to_owned(),
            http_method: "G".to_owned(),
            auth_user: String::new(),
            auth_pass: String::new(),
            user_agent: String::new(),
            use_name_server: true,
            location_profile_id: String::new(),
            notification_profile_id: String::new(),
            threshold_profile_id: String::new(),
            monitor_group_ids: Vec::new(),
            user_group_ids: Vec::new(),
            actions: Vec::new(),
            custom_headers: Vec::new(),
        }
    }
}

impl ProviderConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::ProviderConfigParse)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ProviderConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderConfig;

    #[test]
    fn file_values_override_defaults_field_by_field() {
        let config = ProviderConfig::from_yaml(
            r"
site24x7:
  clientID: some-id
  monitorDefaults:
    autoUserGroup: false
    timeout: 30
    locationProfileID: '456'
    monitorGroupIDs: ['1', '2']
    customHeaders:
      - name: X-Foo
        value: bar
",
        )
        .unwrap();

        let site24x7 = config.site24x7;
        assert_eq!(site24x7.client_id, "some-id");

        let defaults = site24x7.monitor_defaults;
        assert!(!defaults.auto_user_group);
        assert!(defaults.auto_location_profile);
        assert_eq!(defaults.timeout, 30);
        assert_eq!(defaults.check_frequency, "1");
        assert_eq!(defaults.http_method, "G");
        assert!(defaults.use_name_server);
        assert_eq!(defaults.location_profile_id, "456");
        assert_eq!(defaults.monitor_group_ids, vec!["1", "2"]);
        assert_eq!(defaults.custom_headers[0].name, "X-Foo");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = ProviderConfig::from_yaml("{}").unwrap();
        assert_eq!(config.site24x7.monitor_defaults, ProviderConfig::default().site24x7.monitor_defaults);
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(ProviderConfig::from_yaml("site24x7: [").is_err());
    }

    #[test]
    fn secrets_are_not_printed() {
        let mut config = ProviderConfig::default();
        config.site24x7.client_secret = "hunter2".to_owned();
        config.site24x7.monitor_defaults.auth_pass = "hunter3".to_owned();
        assert!(!format!("{config:?}").contains("hunter3"));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
