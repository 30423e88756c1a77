//! Shutdown notification shared by concurrent executions

use tokio::sync::watch;

/// Resolve once `true` is published on the channel.
///
/// A dropped sender means nobody can request a stop any more, so the future
/// stays pending instead of cancelling the caller.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
