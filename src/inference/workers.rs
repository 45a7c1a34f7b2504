//! Fixed-size worker pool for CPU bound assessment batches.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::common::error::{ScreenError, ScreenResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Pool {
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    /// Spawn `size` workers; zero is bumped to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let shared_rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|id| {
                let rx = Arc::clone(&shared_rx);
                thread::Builder::new()
                    .name(format!("assess-{id}"))
                    .spawn(move || loop {
                        let job = match rx.lock() {
                            Ok(guard) => guard.recv(),
                            Err(_) => break,
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(ev = "worker_spawn_failed", error = %e);
                    None
                }
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submit<F>(&self, job: F) -> ScreenResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.workers.is_empty() {
            return Err(ScreenError::internal("worker pool has no threads"));
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ScreenError::internal("worker pool is shut down"))?;
        tx.send(Box::new(job))
            .map_err(|_| ScreenError::internal("worker pool is shut down"))
    }
}

impl Drop for Pool {
    // closing the channel lets every worker drain its queue and exit
    fn drop(&mut self) {
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
