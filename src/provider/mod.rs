pub mod null;
pub mod site24x7;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    config::{annotations::AnnotationError, ProviderConfig, PROVIDER_NULL, PROVIDER_SITE24X7},
    monitor::Monitor,
};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("monitor not found")]
    NotFound,
    #[error("unsupported provider {0:?}")]
    Unsupported(String),
    #[error("no {0} configured")]
    NothingConfigured(&'static str),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound)
    }
}

/// A monitoring backend. Monitors are identified by their name, `get` and
/// `delete` report a missing monitor as [`ProviderError::NotFound`].
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create(&self, monitor: &Monitor) -> Result<(), ProviderError>;

    async fn get(&self, name: &str) -> Result<Monitor, ProviderError>;

    /// `monitor.id` carries the provider id of the monitor to update.
    async fn update(&self, monitor: &Monitor) -> Result<(), ProviderError>;

    async fn delete(&self, name: &str) -> Result<(), ProviderError>;

    /// CIDR blocks the provider runs its checks from.
    async fn get_ip_source_ranges(&self, monitor: &Monitor) -> Result<Vec<String>, ProviderError>;
}

/// Creates the provider registered under `name`.
pub fn new(name: &str, config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    match name {
        PROVIDER_SITE24X7 => Ok(Arc::new(site24x7::Site24x7Provider::new(config.site24x7.clone())?)),
        PROVIDER_NULL => Ok(Arc::new(null::NullProvider)),
        _ => Err(ProviderError::Unsupported(name.to_owned())),
    }
}
