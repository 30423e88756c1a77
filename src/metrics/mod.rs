//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction submission and rejection
//! - Receipt queries and their failures
//! - Confirmation outcomes and latency

use crate::error::{TxManagerError, TxResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "tx_manager_transactions_submitted_total",
        "Transactions accepted by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_REJECTED: CounterVec = register_counter_vec!(
        "tx_manager_transactions_rejected_total",
        "Transactions rejected by the node at submit time",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "tx_manager_transactions_confirmed_total",
        "Transactions with an observed receipt",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_TIMED_OUT: CounterVec = register_counter_vec!(
        "tx_manager_transactions_timed_out_total",
        "Transactions without a receipt after the polling budget",
        &["chain_id"]
    ).unwrap();

    pub static ref RECEIPT_QUERIES: CounterVec = register_counter_vec!(
        "tx_manager_receipt_queries_total",
        "Receipt queries sent to the node",
        &["chain_id"]
    ).unwrap();

    pub static ref RECEIPT_QUERY_FAILURES: CounterVec = register_counter_vec!(
        "tx_manager_receipt_query_failures_total",
        "Receipt queries that failed at the transport level",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "tx_manager_confirmation_latency_seconds",
        "Time from first receipt query to observed receipt",
        &["chain_id"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> TxResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TxManagerError::Server(format!("Cannot bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| TxManagerError::Server(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

// Helper functions to record metrics

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_rejected(chain_id: u64) {
    TX_REJECTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_confirmed(chain_id: u64) {
    TX_CONFIRMED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_timeout(chain_id: u64) {
    TX_TIMED_OUT
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_receipt_query(chain_id: u64) {
    RECEIPT_QUERIES
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_query_failure(chain_id: u64) {
    RECEIPT_QUERY_FAILURES
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_latency(chain_id: u64, latency_secs: f64) {
    TX_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}
