use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use k8s_openapi::{
    api::networking::v1::Ingress,
    chrono::{self, DateTime, Utc},
};
use kube::{
    api::{Patch, PatchParams},
    runtime::controller::Action,
    Api, ResourceExt,
};
use serde_json::json;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use super::{events::Event, ControllerError};
use crate::{config::annotations::Annotations, monitor::MonitorService};

/// Persists the annotations of an ingress.
#[async_trait]
pub trait IngressPatcher: Send + Sync {
    async fn patch_annotations(&self, ingress: &Ingress) -> Result<(), kube::Error>;
}

pub struct KubeIngressPatcher {
    client: kube::Client,
}

impl KubeIngressPatcher {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IngressPatcher for KubeIngressPatcher {
    async fn patch_annotations(&self, ingress: &Ingress) -> Result<(), kube::Error> {
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        let patch = json!({ "metadata": { "annotations": ingress.annotations() } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        info!(%namespace, %name, "ingress annotations patched");
        Ok(())
    }
}

/// Brings the monitor of an ingress in line with the latest state of the
/// ingress.
#[derive(TypedBuilder)]
pub struct IngressReconciler {
    service: Arc<dyn MonitorService>,
    patcher: Arc<dyn IngressPatcher>,
    #[builder(default)]
    creation_delay: Duration,
}

impl IngressReconciler {
    pub async fn reconcile(&self, event: &Event) -> Result<Action, ControllerError> {
        let (old, new) = match event {
            Event::Update { old, new } => (old, new),
            Event::Delete { ingress } => {
                self.service.delete_monitor(ingress).await?;
                return Ok(Action::await_change());
            },
        };

        let namespace = new.namespace().unwrap_or_default();
        let name = new.name_any();

        if let Some(delay) = self.remaining_creation_delay(new, Utc::now()) {
            debug!(%namespace, %name, ?delay, "creation delay has not passed yet");
            return Ok(Action::requeue(delay));
        }

        // A patched whitelist triggers another event which then ensures the
        // monitor.
        let mut annotated = Ingress::clone(new);
        match self.service.annotate_ingress(&mut annotated).await {
            Err(err) => {
                warn!(%namespace, %name, %err, "failed to update source range whitelist");
                return Ok(Action::await_change());
            },
            Ok(true) => {
                self.patcher.patch_annotations(&annotated).await?;
                return Ok(Action::await_change());
            },
            Ok(false) => {},
        }

        if Annotations::new(new.metadata.annotations.as_ref()).is_monitor_enabled() {
            self.service.ensure_monitor(new).await?;
        } else {
            self.service.delete_monitor(old).await?;
        }
        Ok(Action::await_change())
    }

    fn remaining_creation_delay(&self, ingress: &Ingress, now: DateTime<Utc>) -> Option<Duration> {
        if self.creation_delay.is_zero() {
            return None;
        }
        let created = ingress.creation_timestamp()?.0;
        let ready_at = created + chrono::Duration::from_std(self.creation_delay).ok()?;
        (ready_at - now).to_std().ok().filter(|delay| !delay.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use k8s_openapi::{
        api::networking::v1::Ingress,
        apimachinery::pkg::apis::meta::v1::Time,
        chrono::{self, Utc},
    };
    use kube::runtime::controller::Action;

    use super::{IngressPatcher, IngressReconciler};
    use crate::{
        controller::events::Event,
        monitor::fake::{FakeService, ServiceCall},
    };

    #[derive(Default)]
    struct RecordingPatcher {
        patched: Mutex<Vec<Ingress>>,
    }

    #[async_trait]
    impl IngressPatcher for RecordingPatcher {
        async fn patch_annotations(&self, ingress: &Ingress) -> Result<(), kube::Error> {
            self.patched.lock().unwrap().push(ingress.clone());
            Ok(())
        }
    }

    fn ingress(enabled: bool, created_ago: chrono::Duration) -> Arc<Ingress> {
        let mut ingress: Ingress = serde_yaml::from_str(&format!(
            r#"
metadata:
  name: foo
  namespace: kube-system
  annotations:
    ingress-monitor.bonial.com/enabled: "{enabled}"
spec:
  rules:
  - host: foo.bar.baz
"#
        ))
        .unwrap();
        ingress.metadata.creation_timestamp = Some(Time(Utc::now() - created_ago));
        Arc::new(ingress)
    }

    struct Fixture {
        service: Arc<FakeService>,
        patcher: Arc<RecordingPatcher>,
        reconciler: IngressReconciler,
    }

    fn fixture(service: FakeService, creation_delay: Duration) -> Fixture {
        let service = Arc::new(service);
        let patcher = Arc::new(RecordingPatcher::default());
        let reconciler = IngressReconciler::builder()
            .service(Arc::clone(&service) as _)
            .patcher(Arc::clone(&patcher) as _)
            .creation_delay(creation_delay)
            .build();
        Fixture { service, patcher, reconciler }
    }

    fn ensured() -> ServiceCall {
        ServiceCall::Ensure("kube-system/foo".to_owned())
    }

    fn deleted() -> ServiceCall {
        ServiceCall::Delete("kube-system/foo".to_owned())
    }

    fn annotated() -> ServiceCall {
        ServiceCall::Annotate("kube-system/foo".to_owned())
    }

    #[tokio::test]
    async fn requeues_until_creation_delay_passed() {
        let f = fixture(FakeService::default(), Duration::from_secs(60));

        let action = f.reconciler.reconcile(&Event::added(ingress(true, chrono::Duration::seconds(30)))).await.unwrap();

        assert_ne!(action, Action::await_change());
        assert!(f.service.calls().is_empty());
        assert!(f.patcher.patched.lock().unwrap().is_empty());
    }

    #[test]
    fn remaining_delay_is_measured_from_creation() {
        let f = fixture(FakeService::default(), Duration::from_secs(60));
        let ingress = ingress(true, chrono::Duration::zero());
        let created = ingress.metadata.creation_timestamp.as_ref().unwrap().0;

        let at = |elapsed| f.reconciler.remaining_creation_delay(&ingress, created + chrono::Duration::seconds(elapsed));

        assert_eq!(at(30), Some(Duration::from_secs(30)));
        assert_eq!(at(59), Some(Duration::from_secs(1)));
        assert_eq!(at(60), None);
        assert_eq!(at(90), None);
    }

    #[test]
    fn no_delay_without_creation_delay_or_timestamp() {
        let ingress = ingress(true, chrono::Duration::zero());
        let f = fixture(FakeService::default(), Duration::ZERO);
        assert_eq!(f.reconciler.remaining_creation_delay(&ingress, Utc::now()), None);

        let mut untimed = Ingress::clone(&ingress);
        untimed.metadata.creation_timestamp = None;
        let f = fixture(FakeService::default(), Duration::from_secs(60));
        assert_eq!(f.reconciler.remaining_creation_delay(&untimed, Utc::now()), None);
    }

    #[tokio::test]
    async fn ensures_monitor_once_creation_delay_passed() {
        let f = fixture(FakeService::default(), Duration::from_secs(60));

        let action = f.reconciler.reconcile(&Event::added(ingress(true, chrono::Duration::seconds(90)))).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(f.service.calls(), vec![annotated(), ensured()]);
    }

    #[tokio::test]
    async fn patched_whitelist_skips_ensure() {
        let service = FakeService {
            annotate_updates: true,
            ..Default::default()
        };
        let f = fixture(service, Duration::ZERO);

        f.reconciler.reconcile(&Event::added(ingress(true, chrono::Duration::zero()))).await.unwrap();

        assert_eq!(f.service.calls(), vec![annotated()]);
        assert_eq!(f.patcher.patched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_whitelist_update_skips_ensure() {
        let service = FakeService {
            fail_annotate: true,
            ..Default::default()
        };
        let f = fixture(service, Duration::ZERO);

        let result = f.reconciler.reconcile(&Event::added(ingress(true, chrono::Duration::zero()))).await;

        assert!(result.is_ok());
        assert_eq!(f.service.calls(), vec![annotated()]);
        assert!(f.patcher.patched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_monitor_is_deleted() {
        let old = ingress(true, chrono::Duration::zero());
        let new = ingress(false, chrono::Duration::zero());
        let f = fixture(FakeService::default(), Duration::ZERO);

        f.reconciler.reconcile(&Event::Update { old, new }).await.unwrap();

        assert_eq!(f.service.calls(), vec![annotated(), deleted()]);
    }

    #[tokio::test]
    async fn delete_events_delete_the_monitor() {
        let f = fixture(FakeService::default(), Duration::ZERO);

        let action = f.reconciler.reconcile(&Event::vanished("kube-system".to_owned(), "foo".to_owned())).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(f.service.calls(), vec![deleted()]);
    }

    #[tokio::test]
    async fn service_errors_are_returned() {
        let service = FakeService {
            fail_ensure: true,
            ..Default::default()
        };
        let f = fixture(service, Duration::ZERO);

        let err = f.reconciler.reconcile(&Event::added(ingress(true, chrono::Duration::zero()))).await.unwrap_err();

        assert_eq!(err.to_string(), "api error 500: internal error");
    }
}
