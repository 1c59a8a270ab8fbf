mod events;
mod reconciler;

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

pub use events::Event;
use futures::{Stream, StreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{
        controller::{self, Action, Config},
        reflector, watcher, Controller, WatchStreamExt,
    },
    Api,
};
pub use reconciler::{IngressPatcher, IngressReconciler, KubeIngressPatcher};
use thiserror::Error;
use tokio::{
    sync::{oneshot, watch},
    time::Instant,
};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

use crate::{
    metrics::MetricsRecorder,
    monitor::{MonitorError, MonitorService},
};

/// Failed ingresses are requeued this many times before they are dropped.
const MAX_REQUEUES: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(5);
const MAX_DELAY: Duration = Duration::from_secs(1000);

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("failed to patch ingress: {0}")]
    Patch(#[from] kube::Error),
}

/// Watches ingresses and reconciles their monitors.
#[derive(TypedBuilder)]
pub struct IngressController {
    client: kube::Client,
    service: Arc<dyn MonitorService>,
    metrics: Arc<dyn MetricsRecorder>,
    #[builder(default)]
    namespace: Option<String>,
    #[builder(default)]
    creation_delay: Duration,
    #[builder(default)]
    resync_interval: Duration,
    #[builder(default = 1)]
    workers: usize,
}

impl IngressController {
    /// Runs until `shutdown` turns `true`. Reconciles in flight are finished
    /// before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let api: Api<Ingress> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        let (store, writer) = reflector::store();
        let ingresses = watcher(api, watcher::Config::default()).default_backoff().reflect(writer).touched_objects();

        let reconciler = IngressReconciler::builder()
            .service(self.service)
            .patcher(Arc::new(KubeIngressPatcher::new(self.client)))
            .creation_delay(self.creation_delay)
            .build();
        let context = Arc::new(Context::new(reconciler, self.metrics));

        let resync = if self.resync_interval.is_zero() {
            futures::stream::pending::<()>().left_stream()
        } else {
            let ticks = tokio::time::interval_at(Instant::now() + self.resync_interval, self.resync_interval);
            IntervalStream::new(ticks)
                .map(|_| {
                    debug!("resyncing ingresses");
                })
                .right_stream()
        };

        let (stop, stopped) = oneshot::channel();
        tokio::spawn(async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
            let _ = stop.send(());
        });

        let workers = u16::try_from(self.workers).unwrap_or(u16::MAX);
        info!(namespace = self.namespace.as_deref().unwrap_or("<all>"), workers, "starting controller");
        let controller = Controller::for_stream(ingresses, store).with_config(Config::default().concurrency(workers));
        drive(controller, context, resync, async move {
            let _ = stopped.await;
        })
        .await;
        info!("controller stopped");
    }
}

/// State shared by all reconciles.
struct Context {
    reconciler: IngressReconciler,
    metrics: Arc<dyn MetricsRecorder>,
    failures: Mutex<HashMap<String, u32>>,
}

impl Context {
    fn new(reconciler: IngressReconciler, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            reconciler,
            metrics,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deletes the monitor of an ingress that is gone from the cache. Retried
    /// in place, the controller cannot requeue objects it no longer knows.
    async fn delete_vanished(&self, namespace: String, name: String) {
        let event = Event::vanished(namespace, name);
        self.failures().remove(&event.key());

        let mut attempts = 0;
        loop {
            match self.reconciler.reconcile(&event).await {
                Ok(_) => return,
                Err(err) if attempts < MAX_REQUEUES => {
                    attempts += 1;
                    let delay = backoff(attempts);
                    warn!(%event, %err, attempts, ?delay, "retrying event after error");
                    tokio::time::sleep(delay).await;
                },
                Err(err) => {
                    error!(%event, %err, "dropping event after repeated errors");
                    self.metrics.event_dropped();
                    return;
                },
            }
        }
    }
}

async fn drive<R, S>(controller: Controller<Ingress>, context: Arc<Context>, resync: R, shutdown: S)
where
    R: Stream<Item = ()> + Send + Sync + 'static,
    S: Future<Output = ()> + Send + Sync + 'static,
{
    controller
        .reconcile_all_on(resync)
        .graceful_shutdown_on(shutdown)
        .run(reconcile, error_policy, Arc::clone(&context))
        .for_each(|result| {
            let context = Arc::clone(&context);
            async move {
                match result {
                    Ok((ingress, action)) => debug!(%ingress, ?action, "reconciled"),
                    Err(controller::Error::ObjectNotFound(ingress)) => {
                        context.delete_vanished(ingress.namespace.unwrap_or_default(), ingress.name).await;
                    },
                    Err(controller::Error::ReconcilerFailed(err, ingress)) => debug!(%ingress, %err, "reconcile failed"),
                    Err(err) => warn!(%err, "ingress controller error"),
                }
            }
        })
        .await;
}

async fn reconcile(ingress: Arc<Ingress>, context: Arc<Context>) -> Result<Action, ControllerError> {
    let key = events::ingress_key(&ingress);
    let action = context.reconciler.reconcile(&Event::added(ingress)).await?;
    context.failures().remove(&key);
    Ok(action)
}

#[allow(clippy::needless_pass_by_value)]
fn error_policy(ingress: Arc<Ingress>, err: &ControllerError, context: Arc<Context>) -> Action {
    let key = events::ingress_key(&ingress);
    let mut failures = context.failures();
    let attempts = {
        let count = failures.entry(key.clone()).or_default();
        *count += 1;
        *count
    };

    if attempts <= MAX_REQUEUES {
        let delay = backoff(attempts);
        warn!(ingress = %key, %err, attempts, ?delay, "requeuing ingress after error");
        return Action::requeue(delay);
    }

    failures.remove(&key);
    drop(failures);
    error!(ingress = %key, %err, "dropping ingress after repeated errors");
    context.metrics.event_dropped();
    Action::await_change()
}

/// Doubles from 5ms with every failure, capped at 1000s.
fn backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    BASE_DELAY.saturating_mul(2_u32.saturating_pow(exponent)).min(MAX_DELAY)
}
