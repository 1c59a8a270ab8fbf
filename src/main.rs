use clap::Parser;
use ingress_monitor_controller::{
    config::{LogFormat, Options},
    start,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

fn init_tracing_logging(format: LogFormat) -> WorkerGuard {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = match format {
        LogFormat::Compact => {
            fmt::layer().event_format(fmt::format().compact()).with_writer(non_blocking_writer).with_target(true).with_ansi(false).boxed()
        },
        LogFormat::Json => fmt::layer().json().with_writer(non_blocking_writer).with_target(true).boxed(),
    };

    Registry::default().with(console_layer.with_filter(filter)).init();
    guard
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ingress_monitor_controller::Result<()> {
    let mut options = Options::parse();
    let _guard = init_tracing_logging(options.log_format);

    options.load_provider_config()?;
    options.validate()?;

    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        tracing::warn!("a TLS crypto provider is already installed");
    }

    start(options).await
}
