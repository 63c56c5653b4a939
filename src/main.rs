use color_eyre::{eyre::eyre, Result};
use encodio::{ConfigSource, EncoderService, EncodioConfig};
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // Optional config path as the only argument
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, source) = EncodioConfig::load(explicit.as_deref())
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;

    setup_logging(config.level()?);
    match source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => warn!("No configuration file found, using defaults"),
    }
    debug!("Configuration: {:?}", config);

    let service = EncoderService::start(&config).await?;
    if service.is_published() {
        info!(
            "Encoder positions available at {}",
            config.publish.attribute_path.display()
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let (enc1, enc2) = service.stop().await?;
    info!("Final positions: {} {}", enc1, enc2);
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
