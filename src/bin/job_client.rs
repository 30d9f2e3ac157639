use tracing::info;

use job_server::client;
use job_server::config::{ClientConfig, LoggingConfig};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ClientConfig::from_env()?;
    let logging = LoggingConfig::from_env()?;

    job_server::logging::init(&logging)?;

    info!("Starting job_client {}...", job_server::VERSION);

    // Clients are I/O bound; one thread drives them all
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(client::run_load(&config));

    if summary.mismatched > 0 {
        return Err(format!("{} replies did not match", summary.mismatched).into());
    }

    Ok(())
}
