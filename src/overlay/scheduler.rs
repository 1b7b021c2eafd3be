//! Debounced reconcile scheduling
//!
//! Overlay inputs tend to arrive in bursts (a page turn changes the rendered sections, the
//! search results and the active annotation within a few milliseconds). The scheduler
//! coalesces a burst into one pass: every new input restarts the window, and when the
//! window expires a single pass runs with the latest inputs.
//!
//! One worker task owns the pass loop, so passes never overlap. A pass that has started
//! runs to completion; inputs arriving meanwhile wait for the next window.
//!
//! Every input carries the scheduler generation it was queued under. [`invalidate_pending`]
//! moves to a new generation, and inputs from an older one are dropped instead of drawn.
//!
//! [`invalidate_pending`]: ReconcileScheduler::invalidate_pending

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{AnnotationReconciler, OverlayInputs};
use crate::token::{OperationToken, TokenChannel};

type Queued = (OperationToken, OverlayInputs);

pub struct ReconcileScheduler {
    sender: mpsc::UnboundedSender<Queued>,
    reconciler: Arc<Mutex<AnnotationReconciler>>,
    generation: Arc<TokenChannel>,
    passes: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl ReconcileScheduler {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(reconciler: Arc<Mutex<AnnotationReconciler>>, window: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let passes = Arc::new(AtomicUsize::new(0));
        let generation = Arc::new(TokenChannel::new());
        let worker = tokio::spawn(run_worker(
            receiver,
            Arc::clone(&reconciler),
            Arc::clone(&generation),
            window,
            Arc::clone(&passes),
        ));

        Self {
            sender,
            reconciler,
            generation,
            passes,
            worker,
        }
    }

    /// Queue new inputs; a pass runs once the window passes without further input
    pub fn schedule(&self, inputs: OverlayInputs) {
        if self.sender.send((self.generation.current(), inputs)).is_err() {
            warn!("Reconcile worker has stopped, dropping overlay update");
        }
    }

    /// Drop every input queued so far, including a burst waiting out its window
    pub fn invalidate_pending(&self) {
        self.generation.invalidate();
    }

    /// Completed passes so far
    pub fn pass_count(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    pub fn reconciler(&self) -> &Arc<Mutex<AnnotationReconciler>> {
        &self.reconciler
    }

    /// Stop accepting input, let a pending pass finish, and wait for the worker
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Reconcile worker ended abnormally");
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Queued>,
    reconciler: Arc<Mutex<AnnotationReconciler>>,
    generation: Arc<TokenChannel>,
    window: Duration,
    passes: Arc<AtomicUsize>,
) {
    while let Some((mut token, mut latest)) = receiver.recv().await {
        let mut coalesced = 1usize;
        loop {
            tokio::select! {
                next = receiver.recv() => match next {
                    Some((next_token, inputs)) => {
                        token = next_token;
                        latest = inputs;
                        coalesced += 1;
                    }
                    None => break,
                },
                _ = tokio::time::sleep(window) => break,
            }
        }

        // Checked under the lock: invalidation happens before teardown takes it
        let mut guard = reconciler.lock().await;
        if !generation.is_current(token) {
            debug!(coalesced, "Dropping overlay inputs from an earlier generation");
            continue;
        }
        let report = guard.reconcile(&latest).await;
        drop(guard);
        let pass = passes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(pass, coalesced, added = report.added, removed = report.removed, "Reconcile pass complete");
    }
    debug!("Reconcile worker stopped");
}
