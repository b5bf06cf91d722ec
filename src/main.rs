//! agency-client - main entry point

use std::io;
use std::process;

use agency_client::config::ClientConfig;
use agency_client::report::{write_stdout_json, write_stdout_line};
use agency_client::{logging, RecordSource, Session, SessionReport, TcpConnector};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = ClientConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let report = match run(&config, cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(client_id = %config.id, error = %e, "session failed");
            process::exit(1);
        }
    };

    let printed = if config.json_report {
        write_stdout_json(&report)
    } else {
        write_stdout_line(&report.summary_line()).map_err(Into::into)
    };
    if let Err(e) = printed {
        tracing::error!(error = %e, "failed to write report");
        process::exit(1);
    }
}

async fn run(config: &ClientConfig, cancel: CancellationToken) -> agency_client::Result<SessionReport> {
    let source = RecordSource::open(config.data_path(), &config.id).await?;
    let connector = TcpConnector::new(config.server_address.clone());

    Session::new(config.session(), connector, source)
        .run(cancel)
        .await
}

/// Turn SIGTERM / Ctrl-C into a cancellation request.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    settle_signal(tokio::signal::ctrl_c().await, "Ctrl-C").await;
}

/// Resolve once a signal arrived; a listener that failed to register never resolves.
async fn settle_signal(result: io::Result<()>, signal: &str) {
    if let Err(e) = result {
        tracing::error!(signal, error = %e, "signal handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivered_signal_resolves() {
        let settled =
            tokio::time::timeout(Duration::from_millis(100), settle_signal(Ok(()), "Ctrl-C")).await;
        assert!(settled.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_registration_does_not_cancel() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let listener = tokio::spawn(async move {
            settle_signal(Err(io::Error::other("no signal driver")), "Ctrl-C").await;
            token.cancel();
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!cancel.is_cancelled());
        listener.abort();
    }
}
