pub mod api;
mod builder;
pub mod client;

use std::{net::IpAddr, sync::Arc};

use async_trait::async_trait;
use itertools::Itertools;
use tracing::{debug, warn};

pub use self::builder::{Defaulter, MonitorBuilder};
use self::client::{Credentials, HttpClient, Site24x7Api};
use super::{Provider, ProviderError};
use crate::{
    config::{annotations, Site24x7Config},
    monitor::Monitor,
};

/// Manages Site24x7 website monitors.
pub struct Site24x7Provider {
    client: Arc<dyn Site24x7Api>,
    config: Site24x7Config,
}

impl Site24x7Provider {
    pub fn new(config: Site24x7Config) -> Result<Self, ProviderError> {
        let client = HttpClient::new(Credentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
        })?;
        Ok(Self::with_client(Arc::new(client), config))
    }

    pub fn with_client(client: Arc<dyn Site24x7Api>, config: Site24x7Config) -> Self {
        Self { client, config }
    }

    async fn build_monitor(&self, model: &Monitor) -> Result<api::Monitor, ProviderError> {
        let defaults = &self.config.monitor_defaults;
        MonitorBuilder::new(self.client.as_ref(), defaults).with_defaulters(Defaulter::enabled(defaults)).build(model).await
    }

    async fn find(&self, name: &str) -> Result<api::Monitor, ProviderError> {
        self.client
            .list_monitors()
            .await?
            .into_iter()
            .find(|monitor| monitor.display_name == name)
            .ok_or(ProviderError::NotFound)
    }

    /// The location profile checks of this monitor run with.
    async fn location_profile_id(&self, model: &Monitor) -> Result<String, ProviderError> {
        let defaults = &self.config.monitor_defaults;
        let mut monitor = api::Monitor {
            location_profile_id: model.annotations().string(annotations::SITE24X7_LOCATION_PROFILE_ID, &defaults.location_profile_id),
            ..Default::default()
        };
        if defaults.auto_location_profile {
            Defaulter::LocationProfile.apply(self.client.as_ref(), &mut monitor).await?;
        }
        Ok(monitor.location_profile_id)
    }
}

#[async_trait]
impl Provider for Site24x7Provider {
    async fn create(&self, model: &Monitor) -> Result<(), ProviderError> {
        let monitor = self.build_monitor(model).await?;
        self.client.create_monitor(&monitor).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Monitor, ProviderError> {
        let monitor = self.find(name).await?;
        Ok(Monitor::builder().id(monitor.monitor_id).name(monitor.display_name).url(monitor.website).build())
    }

    async fn update(&self, model: &Monitor) -> Result<(), ProviderError> {
        let monitor = self.build_monitor(model).await?;
        self.client.update_monitor(&monitor).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let monitor = self.find(name).await?;
        self.client.delete_monitor(&monitor.monitor_id).await
    }

    async fn get_ip_source_ranges(&self, model: &Monitor) -> Result<Vec<String>, ProviderError> {
        let profile_id = self.location_profile_id(model).await?;
        if profile_id.is_empty() {
            debug!(monitor = %model.name, "no location profile, no source ranges");
            return Ok(Vec::new());
        }

        let profile = self.client.get_location_profile(&profile_id).await?;
        let location_ids: Vec<&str> =
            std::iter::once(profile.primary_location.as_str()).chain(profile.secondary_locations.iter().map(String::as_str)).collect();

        let locations = self.client.list_locations().await?;
        let source_ranges = location_ids
            .into_iter()
            .filter_map(|id| locations.iter().find(|location| location.location_id == id))
            .flat_map(|location| location.ip_address.split(',').chain(location.ipv6_address.split(',')))
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .filter_map(|address| match address.parse::<IpAddr>() {
                Ok(IpAddr::V4(ip)) => Some(format!("{ip}/32")),
                Ok(IpAddr::V6(ip)) => Some(format!("{ip}/128")),
                Err(_) => {
                    warn!(address, "ignoring malformed location address");
                    None
                },
            })
            .unique()
            .collect();

        Ok(source_ranges)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;

    use super::{
        api::{Location, LocationProfile, Monitor, MonitorGroup, NotificationProfile, ThresholdProfile, UserGroup},
        client::Site24x7Api,
        Site24x7Provider,
    };
    use crate::{
        config::Site24x7Config,
        monitor,
        provider::{Provider, ProviderError},
    };

    /// In-memory Site24x7 account.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub monitors: Mutex<Vec<Monitor>>,
        pub location_profiles: Vec<LocationProfile>,
        pub notification_profiles: Vec<NotificationProfile>,
        pub threshold_profiles: Vec<ThresholdProfile>,
        pub monitor_groups: Vec<MonitorGroup>,
        pub user_groups: Vec<UserGroup>,
        pub locations: Vec<Location>,
        pub deleted: Mutex<Vec<String>>,
    }

    impl FakeApi {
        pub(crate) fn with_profiles() -> Self {
            Self {
                location_profiles: vec![LocationProfile {
                    profile_id: "location-1".to_owned(),
                    primary_location: "1".to_owned(),
                    secondary_locations: vec!["2".to_owned(), "3".to_owned()],
                    ..Default::default()
                }],
                notification_profiles: vec![NotificationProfile { profile_id: "notification-1".to_owned(), ..Default::default() }],
                threshold_profiles: vec![ThresholdProfile { profile_id: "threshold-1".to_owned(), ..Default::default() }],
                monitor_groups: vec![MonitorGroup { group_id: "group-1".to_owned(), ..Default::default() }],
                user_groups: vec![UserGroup { user_group_id: "user-group-1".to_owned(), ..Default::default() }],
                locations: vec![
                    Location { location_id: "1".to_owned(), ip_address: "1.2.3.4".to_owned(), ..Default::default() },
                    Location {
                        location_id: "2".to_owned(),
                        ip_address: "5.6.7.8, 1.2.3.4".to_owned(),
                        ipv6_address: "2001:db8::1".to_owned(),
                        ..Default::default()
                    },
                    Location { location_id: "3".to_owned(), ip_address: "not-an-ip".to_owned(), ..Default::default() },
                    Location { location_id: "4".to_owned(), ip_address: "9.9.9.9".to_owned(), ..Default::default() },
                ],
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Site24x7Api for FakeApi {
        async fn list_monitors(&self) -> Result<Vec<Monitor>, ProviderError> {
            Ok(self.monitors.lock().unwrap().clone())
        }

        async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError> {
            let mut monitors = self.monitors.lock().unwrap();
            let created = Monitor { monitor_id: format!("{}", monitors.len() + 1), ..monitor.clone() };
            monitors.push(created.clone());
            Ok(created)
        }

        async fn update_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError> {
            let mut monitors = self.monitors.lock().unwrap();
            let existing = monitors.iter_mut().find(|m| m.monitor_id == monitor.monitor_id).ok_or(ProviderError::NotFound)?;
            *existing = monitor.clone();
            Ok(monitor.clone())
        }

        async fn delete_monitor(&self, id: &str) -> Result<(), ProviderError> {
            self.monitors.lock().unwrap().retain(|m| m.monitor_id != id);
            self.deleted.lock().unwrap().push(id.to_owned());
            Ok(())
        }

        async fn list_location_profiles(&self) -> Result<Vec<LocationProfile>, ProviderError> {
            Ok(self.location_profiles.clone())
        }

        async fn get_location_profile(&self, id: &str) -> Result<LocationProfile, ProviderError> {
            self.location_profiles.iter().find(|p| p.profile_id == id).cloned().ok_or(ProviderError::NotFound)
        }

        async fn list_locations(&self) -> Result<Vec<Location>, ProviderError> {
            Ok(self.locations.clone())
        }

        async fn list_notification_profiles(&self) -> Result<Vec<NotificationProfile>, ProviderError> {
            Ok(self.notification_profiles.clone())
        }

        async fn list_threshold_profiles(&self) -> Result<Vec<ThresholdProfile>, ProviderError> {
            Ok(self.threshold_profiles.clone())
        }

        async fn list_monitor_groups(&self) -> Result<Vec<MonitorGroup>, ProviderError> {
            Ok(self.monitor_groups.clone())
        }

        async fn list_user_groups(&self) -> Result<Vec<UserGroup>, ProviderError> {
            Ok(self.user_groups.clone())
        }
    }

    fn provider(api: &Arc<FakeApi>) -> Site24x7Provider {
        Site24x7Provider::with_client(Arc::clone(api) as Arc<dyn Site24x7Api>, Site24x7Config::default())
    }

    fn model() -> monitor::Monitor {
        monitor::Monitor::builder().name("kube-system-foo".to_owned()).url("http://foo.bar.baz".to_owned()).build()
    }

    #[tokio::test]
    async fn create_then_get_by_name() {
        let api = Arc::new(FakeApi::with_profiles());
        let provider = provider(&api);

        assert!(provider.get("kube-system-foo").await.unwrap_err().is_not_found());
        provider.create(&model()).await.unwrap();

        let monitor = provider.get("kube-system-foo").await.unwrap();
        assert_eq!(monitor.id, "1");
        assert_eq!(monitor.url, "http://foo.bar.baz");
        assert_eq!(api.monitors.lock().unwrap()[0].location_profile_id, "location-1");
    }

    #[tokio::test]
    async fn update_keeps_the_monitor_id() {
        let api = Arc::new(FakeApi::with_profiles());
        let provider = provider(&api);
        provider.create(&model()).await.unwrap();

        let mut updated = model();
        updated.id = "1".to_owned();
        updated.url = "https://foo.bar.baz".to_owned();
        provider.update(&updated).await.unwrap();

        let monitors = api.monitors.lock().unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].website, "https://foo.bar.baz");
    }

    #[tokio::test]
    async fn delete_looks_up_the_id_by_name() {
        let api = Arc::new(FakeApi::with_profiles());
        let provider = provider(&api);
        provider.create(&model()).await.unwrap();

        provider.delete("kube-system-foo").await.unwrap();
        assert_eq!(*api.deleted.lock().unwrap(), vec!["1"]);

        assert!(provider.delete("kube-system-foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn source_ranges_of_profile_locations() {
        let api = Arc::new(FakeApi::with_profiles());

        let ranges = provider(&api).get_ip_source_ranges(&model()).await.unwrap();

        assert_eq!(ranges, vec!["1.2.3.4/32", "5.6.7.8/32", "2001:db8::1/128"]);
    }

    #[tokio::test]
    async fn explicit_location_profile_wins() {
        let mut fake = FakeApi::with_profiles();
        fake.location_profiles.push(super::api::LocationProfile {
            profile_id: "other".to_owned(),
            primary_location: "4".to_owned(),
            ..Default::default()
        });
        let api = Arc::new(fake);
        let annotations = BTreeMap::from([(
            "site24x7.ingress-monitor.bonial.com/location-profile-id".to_owned(),
            "other".to_owned(),
        )]);
        let model = monitor::Monitor::builder().name("foo".to_owned()).url("http://foo".to_owned()).annotations(annotations).build();

        let ranges = provider(&api).get_ip_source_ranges(&model).await.unwrap();

        assert_eq!(ranges, vec!["9.9.9.9/32"]);
    }
}
