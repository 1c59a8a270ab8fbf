//! Wire types of the Site24x7 REST API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every Site24x7 response is wrapped in this envelope. A `code` other than
/// zero signals an API level error.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub monitor_id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub website: String,
    pub check_frequency: String,
    pub http_method: String,
    pub auth_user: String,
    pub auth_pass: String,
    pub match_case: bool,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_headers: Vec<Header>,
    pub timeout: i64,
    pub location_profile_id: String,
    pub notification_profile_id: String,
    pub threshold_profile_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub monitor_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub action_ids: Vec<ActionRef>,
    pub use_name_server: bool,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("monitor_id", &self.monitor_id)
            .field("display_name", &self.display_name)
            .field("type_", &self.type_)
            .field("website", &self.website)
            .field("check_frequency", &self.check_frequency)
            .field("http_method", &self.http_method)
            .field("auth_user", &self.auth_user)
            .field("auth_pass", &"<redacted>")
            .field("match_case", &self.match_case)
            .field("user_agent", &self.user_agent)
            .field("custom_headers", &self.custom_headers)
            .field("timeout", &self.timeout)
            .field("location_profile_id", &self.location_profile_id)
            .field("notification_profile_id", &self.notification_profile_id)
            .field("threshold_profile_id", &self.threshold_profile_id)
            .field("monitor_groups", &self.monitor_groups)
            .field("user_group_ids", &self.user_group_ids)
            .field("action_ids", &self.action_ids)
            .field("use_name_server", &self.use_name_server)
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub action_id: String,
    pub alert_type: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocationProfile {
    pub profile_id: String,
    pub profile_name: String,
    pub primary_location: String,
    pub secondary_locations: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationProfile {
    pub profile_id: String,
    pub profile_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdProfile {
    pub profile_id: String,
    pub profile_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorGroup {
    pub group_id: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserGroup {
    pub user_group_id: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocationTemplate {
    pub locations: Vec<Location>,
}

/// A monitoring location. `ip_address` may hold several comma separated
/// addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Location {
    pub location_id: String,
    pub display_name: String,
    pub ip_address: String,
    pub ipv6_address: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub error: Option<String>,
}
