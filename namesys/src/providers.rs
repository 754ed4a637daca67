//! Background announcement of provided content.
//!
//! [ProvideQueue::provide] never waits: keys go into an unbounded intake, a collector
//! task buffers them and hands them one at a time through a single-slot channel to a
//! spawner, which runs at most `worker_max` [ContentRouting::provide] calls at once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use namesys_common::Multihash;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::errors::RoutingError;
use crate::routing::ContentRouting;

/// Default number of concurrent provide calls.
pub const DEFAULT_WORKER_MAX: usize = 8;

/// Default bound on a single provide call.
pub const DEFAULT_PROVIDE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings of a [ProvideQueue].
#[derive(Debug, Clone)]
pub struct ProvideSettings {
    pub(crate) worker_max: usize,
    pub(crate) provide_timeout: Duration,
}

impl ProvideSettings {
    /// Default settings.
    pub fn new() -> Self {
        Self {
            worker_max: DEFAULT_WORKER_MAX,
            provide_timeout: DEFAULT_PROVIDE_TIMEOUT,
        }
    }

    /// Concurrent provide calls. At least one always runs.
    pub fn worker_max(&mut self, worker_max: usize) -> &mut Self {
        self.worker_max = worker_max.max(1);
        self
    }

    /// Bound on a single provide call.
    pub fn provide_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.provide_timeout = timeout;
        self
    }
}

impl Default for ProvideSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the provider announcement tasks.
#[derive(Debug)]
pub struct ProvideQueue {
    intake: mpsc::UnboundedSender<Multihash>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ProvideQueue {
    /// Spawn the collector and worker tasks.
    pub fn start(router: Arc<dyn ContentRouting>, settings: ProvideSettings) -> Self {
        let (intake, intake_rx) = mpsc::unbounded_channel();
        let (lookahead, lookahead_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(collect(intake_rx, lookahead, cancel.clone())),
            tokio::spawn(spawn_workers(lookahead_rx, router, settings, cancel.clone())),
        ];

        Self {
            intake,
            cancel,
            tasks,
        }
    }

    /// Queue `key` for announcement. Fails only once the queue is stopped.
    pub fn provide(&self, key: Multihash) -> Result<(), RoutingError> {
        self.intake.send(key).map_err(|_| RoutingError::Offline)
    }

    /// Stop accepting keys and wait until every queued key was announced.
    pub async fn finish(self) {
        drop(self.intake);
        for task in self.tasks {
            let _ = task.await;
        }
    }

    /// Stop now, aborting announcements in flight and dropping queued keys.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

async fn collect(
    mut intake: mpsc::UnboundedReceiver<Multihash>,
    lookahead: mpsc::Sender<Multihash>,
    cancel: CancellationToken,
) {
    let mut pending = VecDeque::new();
    let mut open = true;

    while open || !pending.is_empty() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            key = intake.recv(), if open => match key {
                Some(key) => pending.push_back(key),
                None => open = false,
            },
            permit = lookahead.reserve(), if !pending.is_empty() => {
                let Ok(permit) = permit else { return };
                if let Some(key) = pending.pop_front() {
                    permit.send(key);
                }
            }
        }
    }
}

async fn spawn_workers(
    mut lookahead: mpsc::Receiver<Multihash>,
    router: Arc<dyn ContentRouting>,
    settings: ProvideSettings,
    cancel: CancellationToken,
) {
    let limit = Arc::new(Semaphore::new(settings.worker_max));
    let mut workers = JoinSet::new();

    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = limit.clone().acquire_owned() => permit,
        };
        let Ok(permit) = permit else { break };

        let key = tokio::select! {
            _ = cancel.cancelled() => break,
            key = lookahead.recv() => key,
        };
        let Some(key) = key else { break };

        let router = router.clone();
        let timeout = settings.provide_timeout;
        workers.spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, router.provide(&key)).await {
                Ok(Ok(())) => tracing::debug!("Provided {key}"),
                Ok(Err(error)) => tracing::warn!("Failed to provide {key}: {error}"),
                Err(_) => tracing::warn!("Providing {key} timed out after {timeout:?}"),
            }
        });

        // Reap finished workers so the set does not grow with the queue.
        while workers.try_join_next().is_some() {}
    }

    if cancel.is_cancelled() {
        workers.abort_all();
    }
    while workers.join_next().await.is_some() {}
}
