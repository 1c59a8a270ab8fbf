pub mod annotation;
mod namer;
mod service;
pub mod url;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
pub use namer::Namer;
pub use service::Service;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::{config::annotations::Annotations, provider::ProviderError};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("failed to render monitor name: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Url(#[from] self::url::UrlError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Provider agnostic monitor for a single ingress. It is rebuilt from the
/// ingress on every reconciliation, the provider keeps the actual state.
#[derive(Clone, Debug, Default, PartialEq, Eq, TypedBuilder)]
pub struct Monitor {
    /// Assigned by the provider, empty until the monitor was created.
    #[builder(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    #[builder(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Monitor {
    pub fn annotations(&self) -> Annotations<'_> {
        Annotations::new(Some(&self.annotations))
    }
}

/// Keeps the monitor of an ingress in sync with the ingress.
#[async_trait]
pub trait MonitorService: Send + Sync {
    /// Creates or updates the monitor. Ingresses that cannot be monitored are
    /// skipped without error.
    async fn ensure_monitor(&self, ingress: &Ingress) -> Result<(), MonitorError>;

    /// Only the name and namespace of `ingress` are used. A monitor that is
    /// already gone is not an error.
    async fn delete_monitor(&self, ingress: &Ingress) -> Result<(), MonitorError>;

    async fn get_provider_ip_source_ranges(&self, ingress: &Ingress) -> Result<Vec<String>, MonitorError>;

    /// Adds missing provider source ranges to the IP whitelist annotation.
    /// Returns `true` if `ingress` was changed, persisting it is up to the
    /// caller.
    async fn annotate_ingress(&self, ingress: &mut Ingress) -> Result<bool, MonitorError>;
}
