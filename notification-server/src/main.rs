use anyhow::Context;
use notification_server::config::AppConfig;
use notification_server::logging;
use notification_server::services::Container;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let _guard = logging::init_logging(&config).context("could not initialize logging")?;

    info!(
        development = config.development,
        topic = %config.topic,
        failure_policy = %config.failure_policy,
        "Starting notification-server"
    );

    let container = match Container::build(&config).await {
        Ok(container) => container,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e).context("startup failed");
        }
    };

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    match container.run(token).await {
        Ok(report) => {
            info!(report = %report, "notification-server stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "notification-server stopped after a failure");
            Err(e).context("notification-server failed")
        }
    }
}

/// Cancel `token` on Ctrl-C.
async fn shutdown_signal(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            error!(error = %e, "Could not listen for Ctrl-C");
            return;
        }
    }
    token.cancel();
}
