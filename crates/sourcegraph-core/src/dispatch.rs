//! Hand-off from background workers to the UI thread.
//!
//! Workers run on the tokio pool and produce at most one [`UiTask`]. The
//! task travels through a single-consumer channel and only runs when the
//! owner of the [`UiDispatcher`] drains it, so host methods are never called
//! off the UI thread.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::host::UiScope;

pub type UiTask = Box<dyn FnOnce(&UiScope) + Send>;

/// Result of one finished worker, waiting to be run on the UI thread.
pub struct Completion {
    worker: &'static str,
    task: Option<UiTask>,
}

impl Completion {
    pub fn worker(&self) -> &'static str {
        self.worker
    }

    pub fn run(self, scope: &UiScope) {
        match self.task {
            Some(task) => {
                debug!(target: "sourcegraph_dispatch", worker = self.worker, "running UI task");
                task(scope);
            }
            None => debug!(target: "sourcegraph_dispatch", worker = self.worker, "worker finished without UI work"),
        }
    }
}

#[derive(Clone)]
pub struct UiSender {
    tx: mpsc::UnboundedSender<Completion>,
    spawned: Arc<AtomicUsize>,
}

pub struct UiDispatcher {
    rx: mpsc::UnboundedReceiver<Completion>,
    spawned: Arc<AtomicUsize>,
    completed: usize,
}

pub fn ui_channel() -> (UiSender, UiDispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = Arc::new(AtomicUsize::new(0));
    (
        UiSender {
            tx,
            spawned: spawned.clone(),
        },
        UiDispatcher {
            rx,
            spawned,
            completed: 0,
        },
    )
}

impl UiSender {
    /// Runs `work` off the UI thread. Exactly one completion is delivered to
    /// the dispatcher, even if `work` panics.
    pub fn spawn_worker<F>(&self, worker: &'static str, work: F)
    where
        F: Future<Output = Option<UiTask>> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let tx = self.tx.clone();
        let handle = tokio::spawn(work);
        tokio::spawn(async move {
            let task = match handle.await {
                Ok(task) => task,
                Err(join_error) => {
                    error!(target: "sourcegraph_dispatch", worker, error = %join_error, "worker aborted");
                    None
                }
            };
            if tx.send(Completion { worker, task }).is_err() {
                debug!(target: "sourcegraph_dispatch", worker, "dispatcher dropped; discarding result");
            }
        });
    }
}

impl UiDispatcher {
    /// Workers spawned but not yet run on the UI thread.
    pub fn pending(&self) -> usize {
        self.spawned.load(Ordering::SeqCst) - self.completed
    }

    /// Waits for the next finished worker, or `None` when nothing is pending.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.pending() == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.completed += 1;
        Some(completion)
    }

    /// Runs completions until every spawned worker has been handled.
    pub async fn run_until_idle(&mut self, scope: &UiScope) -> usize {
        let mut ran = 0;
        while let Some(completion) = self.next_completion().await {
            completion.run(scope);
            ran += 1;
        }
        ran
    }
}
