//! Transaction manager binary
//!
//! Submits the transactions listed in the configuration file and waits for
//! their receipts.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tx_manager::config::{LoggingConfig, Settings, SubmissionMode};
use tx_manager::metrics::MetricsServer;
use tx_manager::shutdown::wait_for_shutdown;
use tx_manager::tx::load_wallet;
use tx_manager::{
    ChainProvider, DelegatedTransactionSubmitter, LedgerClient, RawTransactionSubmitter,
    ReceiptPoller, SigningIdentity, TransactionManager, TransactionSubmitter, TxRequest,
};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    init_logging(&settings.logging);

    info!("Starting transaction manager v{}", env!("CARGO_PKG_VERSION"));

    let provider = Arc::new(
        ChainProvider::new(settings.node.clone()).context("Failed to initialize node provider")?,
    );
    if !provider.health_check().await {
        warn!("Node for chain {} is not answering yet", settings.node.chain_id);
    }
    let client: Arc<dyn LedgerClient> = provider.clone();

    let wallet = load_wallet(&settings.wallet.private_key_env, settings.node.chain_id)?;
    let identity: Arc<dyn SigningIdentity> = Arc::new(wallet);
    info!("Using sender {:?}", identity.address());

    let submitter: Arc<dyn TransactionSubmitter> = match settings.submission {
        SubmissionMode::Raw => Arc::new(RawTransactionSubmitter::new(
            client.clone(),
            identity.clone(),
        )),
        SubmissionMode::Delegated => Arc::new(DelegatedTransactionSubmitter::new(
            client.clone(),
            identity.address(),
        )),
    };

    let manager = Arc::new(TransactionManager::new(
        submitter,
        identity,
        ReceiptPoller::new(client, settings.polling),
    ));

    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Ctrl+C / SIGTERM stop every in-flight receipt wait
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping...");
        let _ = shutdown_tx.send(true);
    });

    let executions = settings.transactions.into_iter().enumerate().map(|(idx, config)| {
        let manager = manager.clone();
        let shutdown = shutdown_rx.clone();
        async move {
            let request = TxRequest::from(config);
            let cancel = wait_for_shutdown(shutdown);
            (idx, manager.execute_until(&request, cancel).await)
        }
    });

    let mut failures = 0usize;
    for (idx, result) in futures::future::join_all(executions).await {
        match result {
            Ok(receipt) => {
                let json = serde_json::to_string(&receipt)
                    .unwrap_or_else(|_| format!("{:?}", receipt));
                info!("Transaction #{} confirmed: {}", idx, json);
            }
            Err(e) => {
                failures += 1;
                match e.tx_hash() {
                    Some(tx_hash) => error!("Transaction #{} ({:?}) failed: {}", idx, tx_hash, e),
                    None => error!("Transaction #{} failed: {}", idx, e),
                }
            }
        }
    }

    signal_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    if failures > 0 {
        anyhow::bail!("{} transaction(s) did not confirm", failures);
    }

    info!("Transaction manager finished");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = config
        .filter
        .clone()
        .unwrap_or_else(|| "info,tx_manager=debug,hyper=warn".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
