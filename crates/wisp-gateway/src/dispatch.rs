//! Fire-and-forget background task dispatch

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawns detached background units for webhook processing.
///
/// Policy: there is no bound on in-flight units and no admission control.
/// The webhook responder acknowledges before any work starts and never waits
/// on model latency; a traffic burst simply means more concurrent units.
///
/// A unit's error is caught and logged here, at the outermost boundary; it
/// never reaches the HTTP layer, which has already responded.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Spawn a detached background unit
    pub fn spawn<F>(&self, label: impl Into<String>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = label.into();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!("Background unit '{}' failed: {:#}", label, e);
            }
        })
    }
}
