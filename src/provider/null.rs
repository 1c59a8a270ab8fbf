use async_trait::async_trait;
use tracing::info;

use super::{Provider, ProviderError};
use crate::monitor::Monitor;

/// Logs monitor operations without performing them.
#[derive(Debug, Default)]
pub struct NullProvider;

#[async_trait]
impl Provider for NullProvider {
    async fn create(&self, monitor: &Monitor) -> Result<(), ProviderError> {
        info!(name = %monitor.name, url = %monitor.url, "create monitor");
        Ok(())
    }

    async fn get(&self, _name: &str) -> Result<Monitor, ProviderError> {
        Err(ProviderError::NotFound)
    }

    async fn update(&self, monitor: &Monitor) -> Result<(), ProviderError> {
        info!(name = %monitor.name, url = %monitor.url, "update monitor");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        info!(name, "delete monitor");
        Ok(())
    }

    async fn get_ip_source_ranges(&self, _monitor: &Monitor) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}
