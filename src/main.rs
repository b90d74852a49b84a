//! `intellichem2mqtt`: poll an IntelliChem controller and relay it to MQTT.

mod cli;

use std::time::Duration;

use clap::Parser;
use intellichem::{
    app::Bridge,
    client::{BusClient, open_serial},
    config::AppConfig,
    error::BridgeError,
    mqtt::{MqttClient, Topics},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MQTT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let cli = cli::Cli::parse();
    if cli.generate_config {
        print!("{}", AppConfig::default_yaml()?);
        return Ok(());
    }

    let config = AppConfig::load(&cli.config)?;
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_listen {
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!(%addr, "serving metrics"),
            Err(e) => warn!(error = %e, "failed to start metrics exporter"),
        }
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_listen.is_some() {
        warn!("built without the metrics feature; --metrics-listen ignored");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let serial = open_serial(&config.serial)?;
    info!(port = %config.serial.port, baudrate = config.serial.baudrate, "serial port open");
    let client = BusClient::new(
        serial,
        config.intellichem.address,
        config.intellichem.timeout(),
    );

    if !config.mqtt.enabled() {
        info!("no MQTT host configured, running in log-only mode");
        let (_, events) = mpsc::channel(1);
        let stats = Bridge::<_, MqttClient>::from_config(client, &config, None)
            .run(events, shutdown)
            .await?;
        info!(?stats, "finished");
        return Ok(());
    }

    let topics = Topics::new(&config.mqtt.topic_prefix);
    let (mqtt, task) = MqttClient::connect(&config.mqtt, &topics);
    let mqtt_stop = CancellationToken::new();
    let (events, mqtt_task) = task.spawn(mqtt_stop.clone());
    let result = Bridge::from_config(client, &config, Some(mqtt.clone()))
        .run(events, shutdown)
        .await;

    if let Err(e) = mqtt.disconnect().await {
        warn!(error = %e, "MQTT disconnect failed");
    }
    if tokio::time::timeout(MQTT_DRAIN_TIMEOUT, mqtt_task).await.is_err() {
        mqtt_stop.cancel();
    }
    let stats = result?;
    info!(?stats, "finished");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown requested");
    shutdown.cancel();
}
