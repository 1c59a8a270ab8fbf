mod server;

use std::sync::Arc;

use json_patch::{jsonptr::PointerBuf, Patch, PatchOperation, ReplaceOperation};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    core::{
        admission::{AdmissionRequest, AdmissionResponse},
        DynamicObject, GroupVersionResource,
    },
    ResourceExt,
};
pub use server::{router, serve};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::{config::annotations, monitor::MonitorService};

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("failed to decode ingress object: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to load TLS certificate or key: {0}")]
    Tls(#[source] std::io::Error),
    #[error("admission webhook server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Mutating webhook that adds the provider source ranges to the IP whitelist
/// of ingresses. Internal failures never block an ingress from being admitted.
pub struct Webhook {
    service: Arc<dyn MonitorService>,
}

impl Webhook {
    pub fn new(service: Arc<dyn MonitorService>) -> Self {
        Self { service }
    }

    pub async fn admit(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let response = AdmissionResponse::from(req);

        if !is_supported_resource(&req.resource) {
            debug!(resource = ?req.resource, "ignoring unsupported resource");
            return response;
        }

        let Some(object) = &req.object else {
            return response;
        };

        let mut ingress = match decode_ingress(object) {
            Ok(ingress) => ingress,
            Err(err) => return response.deny(err.to_string()),
        };
        if ingress.metadata.namespace.is_none() {
            ingress.metadata.namespace.clone_from(&req.namespace);
        }

        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();

        match self.service.annotate_ingress(&mut ingress).await {
            Ok(true) => {},
            Ok(false) => return response,
            Err(err) => {
                error!(%namespace, %name, %err, "skipping update of source range whitelist");
                return response;
            },
        }

        match response.clone().with_patch(whitelist_patch(&ingress)) {
            Ok(patched) => {
                debug!(%namespace, %name, "responding with source range whitelist patch");
                patched
            },
            Err(err) => {
                error!(%namespace, %name, %err, "failed to create source range whitelist patch");
                response
            },
        }
    }
}

fn is_supported_resource(resource: &GroupVersionResource) -> bool {
    resource.group == "networking.k8s.io" && resource.version == "v1" && resource.resource == "ingresses"
}

fn decode_ingress(object: &DynamicObject) -> Result<Ingress, AdmissionError> {
    serde_json::to_value(object).and_then(serde_json::from_value).map_err(AdmissionError::Decode)
}

/// Replaces the whitelist annotation with its current value on `ingress`.
fn whitelist_patch(ingress: &Ingress) -> Patch {
    let value = ingress.annotations().get(annotations::NGINX_WHITELIST_SOURCE_RANGE).cloned().unwrap_or_default();

    Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path: PointerBuf::from_tokens(["metadata", "annotations", annotations::NGINX_WHITELIST_SOURCE_RANGE]),
        value: Value::String(value),
    })])
}
