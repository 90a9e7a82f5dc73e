use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use super::{ThresholdError, ThresholdNetwork};

/// Upper bound on threshold-network connection initialization
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, lazily-connected handle to the threshold network
///
/// Connects exactly once on first use and reuses the connection across
/// calls and across concurrent pipeline invocations. This is the only
/// cross-invocation shared resource in the pipeline; it lives in the
/// composition root and is torn down by [`Self::shutdown`] at process
/// exit, never per-invocation.
#[derive(Clone)]
pub struct ThresholdHandle {
    network: Arc<dyn ThresholdNetwork>,
    connected: Arc<OnceCell<()>>,
}

impl ThresholdHandle {
    pub fn new(network: Arc<dyn ThresholdNetwork>) -> Self {
        Self {
            network,
            connected: Arc::new(OnceCell::new()),
        }
    }

    /// Get the connected network, initializing the connection on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ThresholdError::ConnectTimeout`] if initialization exceeds
    /// [`CONNECT_TIMEOUT`] rather than hanging indefinitely.
    pub async fn network(&self) -> Result<Arc<dyn ThresholdNetwork>, ThresholdError> {
        self.connected
            .get_or_try_init(|| async {
                tracing::debug!("connecting to threshold network");
                match tokio::time::timeout(CONNECT_TIMEOUT, self.network.connect()).await {
                    Ok(result) => result,
                    Err(_) => Err(ThresholdError::ConnectTimeout(CONNECT_TIMEOUT)),
                }
            })
            .await?;
        Ok(self.network.clone())
    }

    /// Tear down the shared connection. Called once at process shutdown;
    /// a teardown failure is logged, not surfaced.
    pub async fn shutdown(&self) {
        if self.connected.get().is_none() {
            return;
        }
        if let Err(e) = self.network.disconnect().await {
            tracing::warn!("threshold network teardown failed: {}", e);
        }
    }
}
