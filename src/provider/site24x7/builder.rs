use tracing::debug;

use super::{api, client::Site24x7Api};
use crate::{
    config::{annotations, Site24x7MonitorDefaults},
    monitor::Monitor,
    provider::ProviderError,
};

const MONITOR_TYPE_URL: &str = "URL";

/// Fills an unset field of a monitor with the first matching resource known to
/// Site24x7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Defaulter {
    LocationProfile,
    NotificationProfile,
    ThresholdProfile,
    MonitorGroup,
    UserGroup,
}

impl Defaulter {
    /// The defaulters enabled by the `auto*` monitor defaults.
    pub fn enabled(defaults: &Site24x7MonitorDefaults) -> Vec<Defaulter> {
        [
            (defaults.auto_location_profile, Defaulter::LocationProfile),
            (defaults.auto_monitor_group, Defaulter::MonitorGroup),
            (defaults.auto_notification_profile, Defaulter::NotificationProfile),
            (defaults.auto_threshold_profile, Defaulter::ThresholdProfile),
            (defaults.auto_user_group, Defaulter::UserGroup),
        ]
        .into_iter()
        .filter_map(|(enabled, defaulter)| enabled.then_some(defaulter))
        .collect()
    }

    pub async fn apply(self, client: &dyn Site24x7Api, monitor: &mut api::Monitor) -> Result<(), ProviderError> {
        match self {
            Defaulter::LocationProfile if monitor.location_profile_id.is_empty() => {
                let profile = first(client.list_location_profiles().await?, "location profiles")?;
                monitor.location_profile_id = profile.profile_id;
            },
            Defaulter::NotificationProfile if monitor.notification_profile_id.is_empty() => {
                let profile = first(client.list_notification_profiles().await?, "notification profiles")?;
                monitor.notification_profile_id = profile.profile_id;
            },
            Defaulter::ThresholdProfile if monitor.threshold_profile_id.is_empty() => {
                let profile = first(client.list_threshold_profiles().await?, "threshold profiles")?;
                monitor.threshold_profile_id = profile.profile_id;
            },
            Defaulter::MonitorGroup if monitor.monitor_groups.is_empty() => {
                let group = first(client.list_monitor_groups().await?, "monitor groups")?;
                monitor.monitor_groups = vec![group.group_id];
            },
            Defaulter::UserGroup if monitor.user_group_ids.is_empty() => {
                let group = first(client.list_user_groups().await?, "user groups")?;
                monitor.user_group_ids = vec![group.user_group_id];
            },
            _ => {},
        }
        Ok(())
    }
}

fn first<T>(items: Vec<T>, what: &'static str) -> Result<T, ProviderError> {
    items.into_iter().next().ok_or(ProviderError::NothingConfigured(what))
}

/// Translates a monitor model into a Site24x7 URL monitor. Annotations on the
/// model override the configured defaults.
pub struct MonitorBuilder<'a> {
    client: &'a dyn Site24x7Api,
    defaults: &'a Site24x7MonitorDefaults,
    defaulters: Vec<Defaulter>,
}

impl<'a> MonitorBuilder<'a> {
    pub fn new(client: &'a dyn Site24x7Api, defaults: &'a Site24x7MonitorDefaults) -> Self {
        Self {
            client,
            defaults,
            defaulters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_defaulters(mut self, defaulters: Vec<Defaulter>) -> Self {
        self.defaulters = defaulters;
        self
    }

    /// Maps the model without contacting Site24x7.
    pub fn from_model(&self, model: &Monitor) -> Result<api::Monitor, ProviderError> {
        let a = model.annotations();
        let d = self.defaults;

        let custom_headers = a.json(annotations::SITE24X7_CUSTOM_HEADERS)?.unwrap_or_else(|| d.custom_headers.clone());
        let action_ids = a.json(annotations::SITE24X7_ACTIONS)?.unwrap_or_else(|| d.actions.clone());

        Ok(api::Monitor {
            monitor_id: model.id.clone(),
            display_name: model.name.clone(),
            type_: MONITOR_TYPE_URL.to_owned(),
            website: model.url.clone(),
            check_frequency: a.string(annotations::SITE24X7_CHECK_FREQUENCY, &d.check_frequency),
            http_method: a.string(annotations::SITE24X7_HTTP_METHOD, &d.http_method),
            auth_user: a.string(annotations::SITE24X7_AUTH_USER, &d.auth_user),
            auth_pass: a.string(annotations::SITE24X7_AUTH_PASS, &d.auth_pass),
            match_case: a.bool(annotations::SITE24X7_MATCH_CASE, d.match_case),
            user_agent: a.string(annotations::SITE24X7_USER_AGENT, &d.user_agent),
            custom_headers,
            timeout: a.int(annotations::SITE24X7_TIMEOUT, d.timeout),
            location_profile_id: a.string(annotations::SITE24X7_LOCATION_PROFILE_ID, &d.location_profile_id),
            notification_profile_id: a.string(annotations::SITE24X7_NOTIFICATION_PROFILE_ID, &d.notification_profile_id),
            threshold_profile_id: a.string(annotations::SITE24X7_THRESHOLD_PROFILE_ID, &d.threshold_profile_id),
            monitor_groups: a.string_slice(annotations::SITE24X7_MONITOR_GROUP_IDS, &d.monitor_group_ids),
            user_group_ids: a.string_slice(annotations::SITE24X7_USER_GROUP_IDS, &d.user_group_ids),
            action_ids,
            use_name_server: a.bool(annotations::SITE24X7_USE_NAME_SERVER, d.use_name_server),
        })
    }

    pub async fn build(&self, model: &Monitor) -> Result<api::Monitor, ProviderError> {
        let mut monitor = self.from_model(model)?;
        for defaulter in &self.defaulters {
            defaulter.apply(self.client, &mut monitor).await?;
        }
        debug!(?monitor, "built site24x7 monitor");
        Ok(monitor)
    }
}
