use anyhow::Context;
use rawhttp::config::Config;
use rawhttp::http::connection::ConnectionSettings;
use rawhttp::routes::Router;
use rawhttp::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let mut server = Server::bind(
        &cfg.server.listen_addr(),
        Router::new(&cfg),
        ConnectionSettings::from(&cfg),
    )
    .await?;
    tracing::info!("Server started on port {}", server.local_addr().port());

    tokio::select! {
        () = shutdown_signal() => {}
        res = server.wait() => {
            res.context("accept loop failed")?;
            return Ok(());
        }
    }
    server.close();
    server.join().await?;

    tracing::info!("Server gracefully stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
    tracing::info!("Shutdown signal received");
}
