use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use rowsync_config::shared::MetricsConfig;
use tracing::info;

/// Installs the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime since the HTTP listener is spawned on it. When no
/// configuration is given, no recorder is installed and metric macros are no-ops.
pub fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), BuildError> {
    let Some(config) = config else {
        info!("metrics exporter not configured, skipping initialization");

        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(config.listen_address)
        .install()?;

    info!(listen_address = %config.listen_address, "metrics exporter listening");

    Ok(())
}
