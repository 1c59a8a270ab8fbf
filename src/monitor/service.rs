use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use super::{annotation, url, Monitor, MonitorError, MonitorService, Namer};
use crate::{
    metrics::{MetricsRecorder, NoopMetrics},
    provider::Provider,
};

/// Decides whether the monitor of an ingress is created, updated, deleted or
/// left alone.
#[derive(TypedBuilder)]
pub struct Service {
    provider: Arc<dyn Provider>,
    namer: Namer,
    #[builder(default)]
    no_delete: bool,
    #[builder(default = Arc::new(NoopMetrics))]
    metrics: Arc<dyn MetricsRecorder>,
}

impl Service {
    /// Logs why an ingress cannot be monitored. Returns `false` in that case.
    fn is_supported(&self, ingress: &Ingress) -> bool {
        match url::validate(ingress) {
            Ok(()) => true,
            Err(err) => {
                let namespace = ingress.namespace().unwrap_or_default();
                let name = ingress.name_any();
                debug!(%namespace, %name, %err, "ignoring unsupported ingress");
                self.metrics.ingress_validation_error(&namespace, &name);
                false
            },
        }
    }

    fn build_monitor_model(&self, ingress: &Ingress) -> Result<Monitor, MonitorError> {
        Ok(Monitor::builder()
            .name(self.namer.name(ingress)?)
            .url(url::build_url(ingress)?)
            .annotations(ingress.annotations().clone())
            .build())
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<(), MonitorError> {
        self.provider.create(monitor).await?;
        info!(monitor = %monitor.name, "monitor created");
        self.metrics.monitor_created(&monitor.name);
        Ok(())
    }

    async fn update_monitor(&self, old: Monitor, mut new: Monitor) -> Result<(), MonitorError> {
        new.id = old.id;
        self.provider.update(&new).await?;
        info!(monitor = %new.name, "monitor updated");
        self.metrics.monitor_updated(&new.name);
        Ok(())
    }
}

#[async_trait]
impl MonitorService for Service {
    async fn ensure_monitor(&self, ingress: &Ingress) -> Result<(), MonitorError> {
        if !self.is_supported(ingress) {
            return Ok(());
        }

        let monitor = self.build_monitor_model(ingress)?;
        match self.provider.get(&monitor.name).await {
            Ok(existing) => self.update_monitor(existing, monitor).await,
            Err(err) if err.is_not_found() => self.create_monitor(&monitor).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_monitor(&self, ingress: &Ingress) -> Result<(), MonitorError> {
        let name = self.namer.name(ingress)?;
        if self.no_delete {
            debug!(monitor = %name, "not deleting monitor because monitor deletion is disabled");
            return Ok(());
        }

        match self.provider.delete(&name).await {
            Ok(()) => {
                info!(monitor = %name, "monitor deleted");
                self.metrics.monitor_deleted(&name);
                Ok(())
            },
            Err(err) if err.is_not_found() => {
                debug!(monitor = %name, "monitor is not present");
                Ok(())
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn get_provider_ip_source_ranges(&self, ingress: &Ingress) -> Result<Vec<String>, MonitorError> {
        if !self.is_supported(ingress) {
            return Ok(Vec::new());
        }

        let monitor = self.build_monitor_model(ingress)?;
        Ok(self.provider.get_ip_source_ranges(&monitor).await?)
    }

    async fn annotate_ingress(&self, ingress: &mut Ingress) -> Result<bool, MonitorError> {
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();

        if !annotation::should_patch_source_range_whitelist(ingress) {
            debug!(%namespace, %name, "ingress does not require patching of source range whitelist");
            return Ok(false);
        }

        let provider_source_ranges = self.get_provider_ip_source_ranges(ingress).await?;
        if provider_source_ranges.is_empty() {
            debug!(%namespace, %name, "no provider source ranges available");
            return Ok(false);
        }

        let (source_ranges, updated) =
            annotation::merge_source_ranges(annotation::source_range_whitelist(ingress), &provider_source_ranges);
        if !updated {
            debug!(%namespace, %name, "no source range update needed");
            return Ok(false);
        }

        info!(%namespace, %name, "patching source range whitelist");
        annotation::set_source_range_whitelist(ingress, &source_ranges);
        Ok(true)
    }
}
