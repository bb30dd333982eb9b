//! Example: Replaying a SubHub Rotation
//!
//! This example feeds the advertisements of a simulated SubHub relaying three
//! sensors through the advertisement monitor, printing every event as JSON
//! followed by the hub's census.
//!
//! An optional TOML configuration file may be passed as the first argument.
//!
//! Run with: `cargo run --example replay_subhub [config.toml]`
//! Set `RUST_LOG=broodminder_core=debug` to see the tracker's decisions.

use anyhow::Context;
use broodminder_core::{
    AdvertisementBuilder, AdvertisementMonitor, Config, DeviceIdentity, MockSubHub, MonitorEvent,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_validated(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::default(),
    };

    let hub = MockSubHub::new(DeviceIdentity::new(52, 0x01, 0x2F))
        .relay(
            AdvertisementBuilder::for_device(DeviceIdentity::new(43, 0x0A, 0x1C))
                .weights(24.5, 26.0)
                .humidity(61),
        )
        .relay(
            AdvertisementBuilder::for_device(DeviceIdentity::new(57, 0x02, 0x33))
                .weights(31.0, 29.75)
                .realtime_total_weight(60.5),
        )
        .relay_self();
    let hub_key = hub.address().to_string();

    let monitor = AdvertisementMonitor::try_new(config.monitor_options())?;
    let mut rx = monitor.subscribe();

    // Two full rotations.
    let rotation = futures::stream::iter(hub.take(6));
    monitor.run(rotation, CancellationToken::new()).await?;

    println!("Events:");
    while let Ok(event) = rx.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
        if let MonitorEvent::Reading { advertisement, .. } = &event
            && let Some(total) = advertisement
                .reading
                .estimated_total_weight(config.decoder.scale_factor)
        {
            println!("  estimated hive weight: {:.2} lb", total);
        }
    }

    println!();
    println!("Census for hub {}:", hub_key);
    match monitor.census_snapshot(&hub_key).await {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("  (no relays seen)"),
    }

    Ok(())
}
