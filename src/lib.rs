use std::sync::Arc;

use futures::FutureExt;
use kube::Client;
use prometheus_client::registry::Registry;
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    admission::Webhook,
    config::Options,
    controller::IngressController,
    metrics::PrometheusMetrics,
    monitor::{MonitorService, Namer, Service},
};

pub mod admission;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod monitor;
pub mod provider;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Runs the controller, the metrics endpoint and, if enabled, the admission
/// webhook until the process receives SIGINT or SIGTERM.
pub async fn start(options: Options) -> Result<()> {
    info!(provider = %options.provider_name, namespace = ?options.namespace(), "ingress monitor controller started");

    let client = Client::try_default().await?;
    let provider = provider::new(&options.provider_name, &options.provider_config)?;
    let namer = Namer::new(&options.name_template)?;

    let mut registry = Registry::default();
    let metrics = Arc::new(PrometheusMetrics::new(&mut registry));
    let registry = Arc::new(registry);

    let service: Arc<dyn MonitorService> = Arc::new(
        Service::builder()
            .provider(provider)
            .namer(namer)
            .no_delete(options.no_delete)
            .metrics(Arc::clone(&metrics) as _)
            .build(),
    );

    let (shutdown_sender, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutting down");
        let _ = shutdown_sender.send(true);
    });

    let controller = IngressController::builder()
        .client(client)
        .service(Arc::clone(&service))
        .metrics(metrics as _)
        .namespace(options.namespace().map(ToOwned::to_owned))
        .creation_delay(options.creation_delay)
        .resync_interval(options.resync_interval)
        .workers(options.workers)
        .build();

    let controller_task = {
        let shutdown = shutdown.clone();
        async move {
            info!("ingress controller...started");
            controller.run(shutdown).await;
            info!("ingress controller...stopped");
            Ok::<_, Error>(())
        }
    };

    let metrics_task = {
        let shutdown = shutdown.clone();
        let addr = options.metrics_addr;
        async move { metrics::serve(addr, registry, shutdown).await.map_err(Error::from) }
    };

    let mut services = vec![controller_task.boxed(), metrics_task.boxed()];

    if options.enable_admission {
        if let (Some(cert_file), Some(key_file)) = (options.tls_cert_file.clone(), options.tls_private_key_file.clone()) {
            let webhook = Arc::new(Webhook::new(service));
            let addr = options.listen_addr;
            let shutdown = shutdown.clone();
            services.push(
                async move { admission::serve(addr, &cert_file, &key_file, webhook, shutdown).await.map_err(Error::from) }.boxed(),
            );
        }
    }

    let results = futures::future::join_all(services).await;
    info!("ingress monitor controller stopped");

    let mut failed = None;
    for result in results {
        if let Err(err) = result {
            error!(%err, "service failed");
            failed.get_or_insert(err);
        }
    }
    failed.map_or(Ok(()), Err)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for SIGINT");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!(%err, "failed to listen for SIGTERM");
                futures::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
