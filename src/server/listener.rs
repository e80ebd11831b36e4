use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::server::router::Router;

/// Binds the configured address and serves connections until the task is
/// dropped.
///
/// Failing to bind is fatal; a failed `accept` is logged and skipped.
pub async fn run(cfg: &Config, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
    info!("Listening on {}", cfg.server.listen_addr);

    serve(listener, router, ConnectionSettings::from(&cfg.server)).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    settings: ConnectionSettings,
) -> anyhow::Result<()> {
    let router = Arc::new(router);

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let router = Arc::clone(&router);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, router, settings);
            if let Err(e) = conn.run().await {
                error!("Connection error from {}: {:#}", peer, e);
            }
        });
    }
}
