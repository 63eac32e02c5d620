//! Album Select service entry point
//!
//! Starts the album picker, the refresh scheduler and the HTTP API, then runs
//! until Ctrl-C. With `--once` it refreshes a single time and prints the sensor.

use std::sync::Arc;

use album_select::cli::CliOptions;
use album_select::config::Config;
use album_select::jobs::RefreshSchedulerConfig;
use album_select::services::{
    AlbumPicker, AlbumPickerConfig, HttpServerConfig, ServicesManager, logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args();
    let config = Arc::new(Config::from_env()?);

    logging::init(config.log_format);
    tracing::info!(
        album_path = %config.album_path,
        interval_minutes = config.interval_minutes,
        "Configuration loaded"
    );

    if options.once {
        let picker = AlbumPicker::new(AlbumPickerConfig::from(config.as_ref()));
        picker.refresh().await?;
        println!("{}", serde_json::to_string_pretty(&picker.snapshot())?);
        return Ok(());
    }

    let services = ServicesManager::builder()
        .add_service(AlbumPickerConfig::from(config.as_ref()))
        .add_service(RefreshSchedulerConfig {
            interval: config.refresh_interval(),
        })
        .add_service(HttpServerConfig {
            config: config.clone(),
        })
        .start()
        .await?;
    tracing::info!("Album Select started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    services.stop_all().await?;

    Ok(())
}
