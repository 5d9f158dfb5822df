use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Prometheus exporter configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    /// Address the scrape endpoint listens on.
    pub listen_address: SocketAddr,
}
