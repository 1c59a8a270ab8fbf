pub mod annotations;
mod providers;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
pub use providers::{ProviderConfig, Site24x7Config, Site24x7MonitorDefaults, PROVIDER_NULL, PROVIDER_SITE24X7};
use thiserror::Error;

pub const DEFAULT_NAME_TEMPLATE: &str = "{{ Namespace }}-{{ IngressName }}";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:443";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--name-template must not be empty")]
    NameTemplate,
    #[error("--provider must not be empty")]
    Provider,
    #[error("--workers has to be greater than 0")]
    Workers,
    #[error("--tls-cert-file and --tls-private-key-file are required when --enable-admission is set")]
    AdmissionTls,
    #[error("failed to read provider config from {path:?}: {source}")]
    ProviderConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse provider config: {0}")]
    ProviderConfigParse(#[source] serde_yaml::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "ingress-monitor-controller", version, about, long_about = None)]
pub struct Options {
    /// If set, monitors will not be deleted if the ingress is deleted.
    #[arg(long)]
    pub no_delete: bool,

    /// Duration to wait after an ingress is created before creating the monitor for it.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    pub creation_delay: Duration,

    /// Duration after which to recheck all ingresses. 0s disables the resync.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1h")]
    pub resync_interval: Duration,

    /// The template to use for the monitor name. Valid fields are: IngressName, Namespace.
    #[arg(long, default_value = DEFAULT_NAME_TEMPLATE)]
    pub name_template: String,

    /// Namespace to watch. If empty, all namespaces are watched.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Location of the config file for the monitor providers.
    #[arg(long = "provider-config")]
    pub provider_config_file: Option<PathBuf>,

    /// The provider to use for creating monitors.
    #[arg(long = "provider", default_value = PROVIDER_SITE24X7)]
    pub provider_name: String,

    /// File containing the x509 certificate for HTTPS (CA cert, if any, concatenated after server cert).
    #[arg(long)]
    pub tls_cert_file: Option<PathBuf>,

    /// File containing the x509 private key matching --tls-cert-file.
    #[arg(long)]
    pub tls_private_key_file: Option<PathBuf>,

    /// The listen address for the admission webhook.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// If set, a mutating admission webhook is served at --listen-addr. It adds the
    /// provider source ranges to the IP whitelist of ingresses if needed.
    #[arg(long)]
    pub enable_admission: bool,

    /// The listen address for the metrics endpoint.
    #[arg(long, default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Number of workers processing ingress events concurrently.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(skip)]
    pub provider_config: ProviderConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            no_delete: false,
            creation_delay: Duration::ZERO,
            resync_interval: Duration::from_secs(3600),
            name_template: DEFAULT_NAME_TEMPLATE.to_owned(),
            namespace: None,
            provider_config_file: None,
            provider_name: PROVIDER_SITE24X7.to_owned(),
            tls_cert_file: None,
            tls_private_key_file: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 443)),
            enable_admission: false,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            workers: 1,
            log_format: LogFormat::Compact,
            provider_config: ProviderConfig::default(),
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name_template.is_empty() {
            return Err(ConfigError::NameTemplate);
        }
        if self.provider_name.is_empty() {
            return Err(ConfigError::Provider);
        }
        if self.workers == 0 {
            return Err(ConfigError::Workers);
        }
        if self.enable_admission && (self.tls_cert_file.is_none() || self.tls_private_key_file.is_none()) {
            return Err(ConfigError::AdmissionTls);
        }
        Ok(())
    }

    /// Merges the provider config file, if one was given, over the defaults.
    pub fn load_provider_config(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.provider_config_file {
            self.provider_config = ProviderConfig::from_file(path)?;
        }
        Ok(())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|namespace| !namespace.is_empty())
    }
}
