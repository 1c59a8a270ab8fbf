use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use kube::core::{
    admission::{AdmissionRequest, AdmissionReview},
    DynamicObject,
};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{AdmissionError, Webhook};

const GRACE_PERIOD: Duration = Duration::from_secs(5);

async fn admit(State(webhook): State<Arc<Webhook>>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or_default();
    if content_type.split(';').next().map(str::trim) != Some("application/json") {
        warn!(content_type, "rejecting admission request");
        return (StatusCode::BAD_REQUEST, format!("invalid content type {content_type:?}, expected application/json")).into_response();
    }

    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(err) => {
            warn!(%err, "failed to decode admission review");
            return (StatusCode::BAD_REQUEST, format!("failed to decode admission review: {err}")).into_response();
        },
    };

    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            warn!(%err, "admission review carries no request");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        },
    };

    Json(webhook.admit(&req).await.into_review()).into_response()
}

pub fn router(webhook: Arc<Webhook>) -> Router {
    Router::new().route("/admit", post(admit)).with_state(webhook)
}

/// Serves the webhook over TLS until `shutdown` fires. In-flight requests get
/// a short grace period.
pub async fn serve(
    addr: SocketAddr,
    cert_file: &Path,
    key_file: &Path,
    webhook: Arc<Webhook>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AdmissionError> {
    let config = RustlsConfig::from_pem_file(cert_file, key_file).await.map_err(AdmissionError::Tls)?;

    let handle = Handle::new();
    let server = axum_server::bind_rustls(addr, config).handle(handle.clone());
    tokio::spawn(async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
        handle.graceful_shutdown(Some(GRACE_PERIOD));
    });

    info!(%addr, "serving admission webhook");
    server.serve(router(webhook).into_make_service()).await.map_err(AdmissionError::Serve)
}
