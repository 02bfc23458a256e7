use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs the global metrics recorder and serves it on `[::]:<port>/metrics`.
///
/// Must be called from within a Tokio runtime since the exporter spawns its
/// HTTP listener on it.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        .add_global_label("service", "cdr-ingester")
        .install()?;

    Ok(())
}
