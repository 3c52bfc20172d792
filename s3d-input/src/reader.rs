//! Background read workers
//!
//! Each worker owns one thread that runs read jobs strictly in submission
//! order. The input keeps one worker per eye for video and one for audio, so
//! reads of one category are never reordered while video and audio proceed
//! independently.

use crate::{Error, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// A thread that executes submitted jobs one by one and hands back their results
pub(crate) struct ReadWorker<T> {
    name: &'static str,
    jobs: Option<Sender<Job<T>>>,
    results: Receiver<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ReadWorker<T> {
    /// Starts the worker thread
    pub(crate) fn spawn(name: &'static str) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job<T>>();
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in job_rx {
                    if result_tx.send(job()).is_err() {
                        break;
                    }
                }
            })
            .map_err(Error::WorkerSpawn)?;

        debug!(worker = name, "read worker started");
        Ok(Self {
            name,
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queues a job without waiting for it
    pub(crate) fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.jobs
            .as_ref()
            .ok_or(Error::WorkerLost(self.name))?
            .send(Box::new(job))
            .map_err(|_| Error::WorkerLost(self.name))
    }

    /// Blocks until the oldest unclaimed job has finished
    pub(crate) fn wait(&self) -> Result<T> {
        self.results.recv().map_err(|_| Error::WorkerLost(self.name))
    }
}

impl<T> Drop for ReadWorker<T> {
    fn drop(&mut self) {
        // Closing the job channel ends the thread's loop once the current job is done
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(worker = self.name, "read worker panicked");
            }
        }
    }
}

/// Returns the worker in `slot`, starting it on first use
pub(crate) fn lazy_worker<'a, T: Send + 'static>(
    slot: &'a mut Option<ReadWorker<T>>,
    name: &'static str,
) -> Result<&'a ReadWorker<T>> {
    if slot.is_none() {
        *slot = Some(ReadWorker::spawn(name)?);
    }
    slot.as_ref().ok_or(Error::WorkerLost(name))
}
