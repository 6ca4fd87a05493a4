//! Background work: a small worker pool, the result queue drained by the host
//! loop, and a cancellable repeating timer.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::api::XtreamClient;
use crate::epg::{EpgNotice, EpgSnapshot};
use crate::models::{Catalog, Serie};

/// Everything a background task reports back to the host
pub enum TaskResult {
    /// Progress line for the status bar; `None` clears it
    Status {
        provider: Option<String>,
        message: Option<String>,
    },
    /// A freshly built catalog, ready to publish
    ProviderLoaded {
        generation: u64,
        provider: String,
        path: PathBuf,
        catalog: Catalog,
        client: Option<Arc<XtreamClient>>,
    },
    ProviderFailed {
        generation: u64,
        provider: String,
    },
    /// Seasons and episodes fetched for one series
    SeriesLoaded {
        provider: String,
        index: usize,
        serie: Serie,
    },
    LogosCached {
        provider: String,
        count: usize,
    },
    Epg {
        schedule: u64,
        notice: EpgNotice,
    },
    EpgUpdated {
        schedule: u64,
        snapshot: Arc<EpgSnapshot>,
    },
    /// The periodic reload timer fired
    ReloadDue,
}

/// Single-consumer queue the host drains from its own loop
pub fn result_queue() -> (Sender<TaskResult>, Receiver<TaskResult>) {
    channel()
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed from one job channel
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .filter_map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn(move || Self::run(id, receiver))
                    .map_err(|e| error!("Could not start worker {}: {}", id, e))
                    .ok()
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    fn run(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
        loop {
            let job = match receiver.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => break,
            };
            let Ok(job) = job else {
                break;
            };
            // A panicking job must not take the worker down with it
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("Task on worker {} panicked", id);
            }
        }
        debug!("Worker {} stopped", id);
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Returns false once the pool is shutting down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender {
            Some(ref sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets every worker finish its queue and exit
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Repeating timer on its own thread. Stops when cancelled, dropped, or when
/// the tick returns false. A tick already running is never interrupted.
pub struct Timer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Timer {
    /// First tick after one interval
    pub fn start<F>(interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self::spawn(interval, false, tick)
    }

    /// First tick right away
    pub fn start_now<F>(interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self::spawn(interval, true, tick)
    }

    fn spawn<F>(interval: Duration, immediate: bool, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel, cancelled) = channel::<()>();
        let handle = thread::Builder::new()
            .name("timer".to_string())
            .spawn(move || {
                if immediate && !tick() {
                    return;
                }
                loop {
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !tick() {
                                break;
                            }
                        }
                        // Cancelled, or the owner is gone
                        _ => break,
                    }
                }
            })
            .map_err(|e| error!("Could not start timer: {}", e))
            .ok();

        Self {
            cancel: Some(cancel),
            handle,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop future ticks without waiting for the current one
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.handle = None;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
