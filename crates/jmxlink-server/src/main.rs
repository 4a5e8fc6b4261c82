//! `jmxlink` bridge binary.

use anyhow::Context;
use clap::Parser;
use jmxlink_core::{JmxFetcher, JolokiaConnector};
use jmxlink_server::{JmxServiceHandler, Settings, StdioServer, serve_stdio};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Grace period for the blocking stdin reader when the runtime shuts down.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let settings = match Settings::try_parse() {
        Ok(settings) => settings,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(settings));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    settings
        .logging()
        .init()
        .context("failed to initialize logging")?;

    tracing::info!(
        version = jmxlink_core::VERSION,
        agent = settings.agent_url.as_ref().map(|u| u.as_str()),
        "starting jmxlink bridge"
    );

    let connector = JolokiaConnector::new(settings.jolokia());
    let fetcher = JmxFetcher::new(Arc::new(connector));

    let shutdown = CancellationToken::new();
    install_signal_handlers(&shutdown);

    let mut server = StdioServer::new(JmxServiceHandler::new(fetcher)).with_shutdown(shutdown);
    let result = serve_stdio(&mut server).await;

    server.handler().shutdown().await;

    let reason = result.context("request loop failed")?;
    tracing::info!(?reason, "jmxlink bridge exiting");
    Ok(())
}

fn install_signal_handlers(shutdown: &CancellationToken) {
    let on_sigint = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        tracing::info!("Ctrl+C received, initiating shutdown");
        on_sigint.cancel();
    });

    #[cfg(unix)]
    {
        let on_sigterm = shutdown.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    tracing::info!("SIGTERM received, initiating shutdown");
                    on_sigterm.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to install SIGTERM handler"),
            }
        });
    }
}
