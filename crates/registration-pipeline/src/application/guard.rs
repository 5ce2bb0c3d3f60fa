//! Cancellation and timeout bounds shared by the pipeline components.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::{PipelineError, PipelineStage};

/// Caller-side switch that cancels every in-flight and future await of the
/// pipeline it was handed to.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// Create an un-cancelled handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// New receiver observing this handle.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Races awaits against cancellation and the confirmation timeout.
#[derive(Clone, Debug)]
pub struct StageGuard {
    timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl StageGuard {
    /// Guard bounded by `timeout` and observing `cancel`.
    pub fn new(timeout: Duration, cancel: &CancelHandle) -> Self {
        Self {
            timeout,
            cancel: cancel.subscribe(),
        }
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fail with `Cancelled` if cancellation was already requested.
    pub fn check(&self, stage: PipelineStage) -> Result<(), PipelineError> {
        if *self.cancel.borrow() {
            return Err(PipelineError::Cancelled { stage });
        }
        Ok(())
    }

    /// Await `fut`, failing with `Cancelled` or `Timeout` attributed to `stage`.
    pub async fn bound<F>(&self, stage: PipelineStage, fut: F) -> Result<F::Output, PipelineError>
    where
        F: Future,
    {
        self.check(stage)?;
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(PipelineError::Cancelled { stage }),
            res = tokio::time::timeout(self.timeout, fut) => res.map_err(|_| PipelineError::Timeout {
                stage,
                after_ms: millis(self.timeout),
            }),
        }
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Resolves once the flag turns true. Never resolves if the handle is dropped.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
