use std::{net::SocketAddr, sync::Arc};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::{text::encode, EncodeLabelSet},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use tokio::{net::TcpListener, sync::watch};
use tracing::info;

const PREFIX: &str = "ingress_monitor_controller";

/// Receives the events worth counting. Injected into the components that
/// produce them, the process entry point owns the implementation.
pub trait MetricsRecorder: Send + Sync {
    fn monitor_created(&self, monitor: &str);
    fn monitor_updated(&self, monitor: &str);
    fn monitor_deleted(&self, monitor: &str);
    fn ingress_validation_error(&self, namespace: &str, name: &str);
    fn event_dropped(&self);
}

#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn monitor_created(&self, _monitor: &str) {}
    fn monitor_updated(&self, _monitor: &str) {}
    fn monitor_deleted(&self, _monitor: &str) {}
    fn ingress_validation_error(&self, _namespace: &str, _name: &str) {}
    fn event_dropped(&self) {}
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MonitorLabels {
    pub monitor: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct IngressLabels {
    pub namespace: String,
    pub name: String,
}

pub struct PrometheusMetrics {
    monitors_created: Family<MonitorLabels, Counter>,
    monitors_updated: Family<MonitorLabels, Counter>,
    monitors_deleted: Family<MonitorLabels, Counter>,
    ingress_validation_errors: Family<IngressLabels, Counter>,
    events_dropped: Counter,
}

impl PrometheusMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let monitors_created = Family::<MonitorLabels, Counter>::default();
        registry.register(format!("{PREFIX}_monitors_created"), "Number of monitors created", monitors_created.clone());

        let monitors_updated = Family::<MonitorLabels, Counter>::default();
        registry.register(format!("{PREFIX}_monitors_updated"), "Number of monitors updated", monitors_updated.clone());

        let monitors_deleted = Family::<MonitorLabels, Counter>::default();
        registry.register(format!("{PREFIX}_monitors_deleted"), "Number of monitors deleted", monitors_deleted.clone());

        let ingress_validation_errors = Family::<IngressLabels, Counter>::default();
        registry.register(
            format!("{PREFIX}_ingress_validation_errors"),
            "Number of ingresses skipped because they cannot be monitored",
            ingress_validation_errors.clone(),
        );

        let events_dropped = Counter::default();
        registry.register(
            format!("{PREFIX}_events_dropped"),
            "Number of ingress events dropped after exhausting their retries",
            events_dropped.clone(),
        );

        Self {
            monitors_created,
            monitors_updated,
            monitors_deleted,
            ingress_validation_errors,
            events_dropped,
        }
    }

    fn monitor(monitor: &str) -> MonitorLabels {
        MonitorLabels { monitor: monitor.to_owned() }
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn monitor_created(&self, monitor: &str) {
        self.monitors_created.get_or_create(&Self::monitor(monitor)).inc();
    }

    fn monitor_updated(&self, monitor: &str) {
        self.monitors_updated.get_or_create(&Self::monitor(monitor)).inc();
    }

    fn monitor_deleted(&self, monitor: &str) {
        self.monitors_deleted.get_or_create(&Self::monitor(monitor)).inc();
    }

    fn ingress_validation_error(&self, namespace: &str, name: &str) {
        self.ingress_validation_errors
            .get_or_create(&IngressLabels {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            })
            .inc();
    }

    fn event_dropped(&self) {
        self.events_dropped.inc();
    }
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let mut buf = String::new();
    if encode(&mut buf, &registry).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics".to_owned());
    }
    (StatusCode::OK, buf)
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new().route("/metrics", get(metrics_handler)).with_state(registry)
}

/// Serves the registry on `GET /metrics` until `shutdown` fires.
pub async fn serve(addr: SocketAddr, registry: Arc<Registry>, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "serving metrics");
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use prometheus_client::{encoding::text::encode, registry::Registry};
    use tower::ServiceExt;

    use super::{router, MetricsRecorder, PrometheusMetrics};

    #[test]
    fn counters_are_encoded_with_labels() {
        let mut registry = Registry::default();
        let metrics = PrometheusMetrics::new(&mut registry);

        metrics.monitor_created("kube-system-foo");
        metrics.monitor_created("kube-system-foo");
        metrics.monitor_deleted("kube-system-bar");
        metrics.ingress_validation_error("kube-system", "wild");
        metrics.event_dropped();

        let mut buf = String::new();
        encode(&mut buf, &registry).unwrap();
        assert!(buf.contains(r#"ingress_monitor_controller_monitors_created_total{monitor="kube-system-foo"} 2"#));
        assert!(buf.contains(r#"ingress_monitor_controller_monitors_deleted_total{monitor="kube-system-bar"} 1"#));
        assert!(buf.contains(r#"ingress_monitor_controller_ingress_validation_errors_total{namespace="kube-system",name="wild"} 1"#));
        assert!(buf.contains("ingress_monitor_controller_events_dropped_total 1"));
        assert!(buf.contains("# TYPE ingress_monitor_controller_monitors_updated counter"));
    }

    #[tokio::test]
    async fn serves_openmetrics_text() {
        let mut registry = Registry::default();
        let metrics = PrometheusMetrics::new(&mut registry);
        metrics.monitor_updated("foo");

        let response =
            router(Arc::new(registry)).oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(r#"ingress_monitor_controller_monitors_updated_total{monitor="foo"} 1"#));
        assert!(body.ends_with("# EOF\n"));
    }
}
