use anyhow::Result;
use std::{net::SocketAddr, num::NonZero, time::Duration};

use metrics_exporter_prometheus::PrometheusBuilder;

const BUCKET_COUNT: NonZero<u32> = NonZero::new(5).unwrap();

pub(crate) fn init(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_bucket_duration(Duration::from_secs(60))?
        .set_bucket_count(BUCKET_COUNT)
        .install()?;
    tracing::info!("Serving metrics on {addr}");
    Ok(())
}
