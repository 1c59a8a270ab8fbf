use k8s_openapi::api::networking::v1::Ingress;
use thiserror::Error;
use url::Url;

use crate::config::annotations::{self, Annotations};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ingress TLS host {0:?} contains wildcards")]
    WildcardTlsHost(String),
    #[error("ingress host {0:?} contains wildcards")]
    WildcardHost(String),
    #[error("ingress does not have any rules")]
    NoRules,
}

#[derive(Error, Debug)]
pub enum UrlError {
    #[error("ingress does not have any rules")]
    NoRules,
    #[error("invalid monitor url {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Only the first TLS entry and the first rule of an ingress are inspected.
pub fn validate(ingress: &Ingress) -> Result<(), ValidationError> {
    if let Some(host) = tls_host(ingress) {
        return if contains_wildcard(host) {
            Err(ValidationError::WildcardTlsHost(host.to_owned()))
        } else {
            Ok(())
        };
    }

    match rule_host(ingress) {
        None => Err(ValidationError::NoRules),
        Some(host) if contains_wildcard(host) => Err(ValidationError::WildcardHost(host.to_owned())),
        Some(_) => Ok(()),
    }
}

/// Builds the url that is monitored for an ingress. The first TLS host wins
/// over the first rule host and implies https.
pub fn build_url(ingress: &Ingress) -> Result<String, UrlError> {
    let annotations = Annotations::new(ingress.metadata.annotations.as_ref());

    let (scheme, host) = match tls_host(ingress) {
        Some(host) => ("https", host),
        None => {
            let host = rule_host(ingress).ok_or(UrlError::NoRules)?;
            if force_https(&annotations) {
                ("https", host)
            } else {
                ("http", host)
            }
        },
    };

    let path_override = annotations.string(annotations::PATH_OVERRIDE, "");
    let path = if path_override.is_empty() {
        String::new()
    } else {
        format!("/{}", path_override.trim_start_matches('/'))
    };

    // Parsing only validates, the host is kept as written on the ingress.
    let raw = format!("{scheme}://{host}{path}");
    let url = Url::parse(&raw).map_err(|source| UrlError::Parse { url: raw.clone(), source })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::Parse { url: raw, source: url::ParseError::EmptyHost });
    }
    Ok(raw)
}

fn force_https(annotations: &Annotations<'_>) -> bool {
    annotations.bool(annotations::FORCE_HTTPS, false) || annotations.bool(annotations::NGINX_FORCE_SSL_REDIRECT, false)
}

/// The first host of the first TLS entry, if the ingress is TLS enabled.
fn tls_host(ingress: &Ingress) -> Option<&str> {
    ingress
        .spec
        .as_ref()?
        .tls
        .as_ref()?
        .first()?
        .hosts
        .as_ref()?
        .first()
        .map(String::as_str)
        .filter(|host| !host.is_empty())
}

fn rule_host(ingress: &Ingress) -> Option<&str> {
    let rule = ingress.spec.as_ref()?.rules.as_ref()?.first()?;
    Some(rule.host.as_deref().unwrap_or_default())
}

fn contains_wildcard(host: &str) -> bool {
    host.contains('*')
}
