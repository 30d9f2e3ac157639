use std::sync::Arc;

use tracing::{error, info};

use job_server::config::Config;
use job_server::engine::{Engine, ShutdownSignal};
use job_server::server::Server;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    job_server::logging::init(&config.logging)?;

    info!("Starting job_server {}...", job_server::VERSION);
    config.log_summary();

    let engine = Arc::new(Engine::start(&config.engine, ShutdownSignal::new())?);

    // Single-threaded Tokio runtime - worker threads handle the jobs
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async_main(&config, Arc::clone(&engine)));

    // Cleanup
    engine.shutdown();

    result
}

async fn async_main(
    config: &Config,
    engine: Arc<Engine>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::bind(config, Arc::clone(&engine)).await?;

    tokio::select! {
        _ = server.run() => {
            info!("Server stopped");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("Shutting down...");
        }
    }

    Ok(())
}
