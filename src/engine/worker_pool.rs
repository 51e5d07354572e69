//! Bounded pool of analysis threads shared by every session.
//!
//! Jobs go through a bounded crossbeam queue to a fixed set of OS threads.
//! Callers await the result through a oneshot with a deadline; a caller that
//! gives up only stops waiting, the job itself runs to completion and its
//! result is discarded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a submitted job produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Every worker busy and the queue at capacity
    QueueFull,
    /// Result not ready before the deadline
    DeadlineExceeded,
    /// The job panicked; carries the panic message
    WorkerPanicked(String),
    /// Pool is shutting down
    PoolShutDown,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::QueueFull => write!(f, "worker queue full"),
            DispatchError::DeadlineExceeded => write!(f, "deadline exceeded"),
            DispatchError::WorkerPanicked(msg) => write!(f, "worker panicked: {}", msg),
            DispatchError::PoolShutDown => write!(f, "worker pool shut down"),
        }
    }
}

impl std::error::Error for DispatchError {}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers fed by a queue holding at most `queue_capacity` jobs
    pub fn new(threads: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = bounded::<Job>(queue_capacity.max(1));

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("shruti-worker-{}", index))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        tracing::debug!(threads, queue_capacity, "worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn worker_threads(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a free worker
    pub fn queued_jobs(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Run `job` on the pool and wait at most `deadline` for its result
    ///
    /// The job is never queued behind a full queue: submission fails fast
    /// with [`DispatchError::QueueFull`]. Panics inside the job are caught on
    /// the worker and reported as [`DispatchError::WorkerPanicked`].
    pub async fn submit_with_deadline<F, T>(
        &self,
        job: F,
        deadline: Duration,
    ) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(DispatchError::PoolShutDown)?;
        let (tx, rx) = oneshot::channel();

        let task: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
            // Receiver may be gone after a missed deadline
            let _ = tx.send(outcome);
        });

        if let Err(err) = sender.try_send(task) {
            return Err(match err {
                TrySendError::Full(_) => DispatchError::QueueFull,
                TrySendError::Disconnected(_) => DispatchError::PoolShutDown,
            });
        }

        match tokio::time::timeout(deadline, rx).await {
            Err(_) => Err(DispatchError::DeadlineExceeded),
            Ok(Err(_)) => Err(DispatchError::PoolShutDown),
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(DispatchError::WorkerPanicked(message)),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop once it drains
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread exited with a panic");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        job();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
