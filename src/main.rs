use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vmregistry::config::{self, Config};
use vmregistry::db::PgStore;
use vmregistry::server::Server;

// One event loop for every connection; `PgStore` keeps a single database
// connection, so queries are serialized regardless.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env_file = config::load_env_file(None).context("failed to load .env file")?;
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr(),
        db_host = %config.database.host,
        db_name = %config.database.name,
        "vmregistry starting"
    );
    if let Some(path) = &env_file {
        info!(path = %path.display(), "loaded environment file");
    }

    let store = PgStore::connect(&config.database.pg_config())
        .await
        .context("failed to connect to the database")?;

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    let server = Server::new(listener, Arc::new(store)).with_max_frame_length(config.max_frame_length);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    server.serve(shutdown).await;
    Ok(())
}
