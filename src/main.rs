//! pollkv - A Single-Threaded Event-Driven Key-Value Server
//!
//! This is the main entry point for the pollkv server.
//! It parses the command line, sets up logging, runs the reactor on its own
//! thread and turns Ctrl+C / SIGTERM into a clean shutdown.

use clap::Parser;
use pollkv::commands::CommandHandler;
use pollkv::connection::{ConnectionHandler, ConnectionStats};
use pollkv::server::Reactor;
use pollkv::storage::StorageEngine;
use pollkv::Config;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
pollkv v{} - Single-Threaded Event-Driven Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown.
"#,
        pollkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match serve(config).await {
        Ok(()) => info!("Server shutdown complete"),
        Err(e) => error!("Server error: {:#}", e),
    }

    // Both a failed start and a signal-driven stop exit with status 1.
    ExitCode::FAILURE
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let storage = Arc::new(StorageEngine::new());
    let stats = Arc::new(ConnectionStats::new());
    let handler = ConnectionHandler::new(CommandHandler::new(storage), stats);

    let reactor = Reactor::start(&config.host, config.port, handler)?;
    let shutdown = reactor.shutdown_handle();
    print_banner(&config);

    let mut event_loop = tokio::task::spawn_blocking(move || reactor.run());

    tokio::select! {
        result = &mut event_loop => {
            result??;
            anyhow::bail!("event loop exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            shutdown.shutdown()?;
            event_loop.await??;
        }
    }

    Ok(())
}

/// Completes on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
