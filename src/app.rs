use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::infrastructure::bootstrap;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::start_server;

pub fn run() {
    // A missing .env file is normal outside development.
    let _ = dotenvy::dotenv();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
            error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let result = actix_web::rt::System::new().block_on(async move {
        let ingestion = bootstrap::setup(&config).await?;

        info!(host = %config.host, port = config.port, "Starting HTTP server");
        start_server(ingestion, &config.host, config.port)?.await?;
        Ok::<(), crate::domain::error::AppError>(())
    });

    if let Err(err) = result {
        error!(error = %err, "Server stopped with an error");
        std::process::exit(1);
    }
}
