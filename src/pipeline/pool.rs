//! Fixed-size worker pool with a bulk completion wait

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::pipeline::cancel::{CancelToken, Wake};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    pending: AtomicUsize,
    completion: Mutex<()>,
    all_done: Condvar,
}

impl Wake for Shared {
    fn wake(&self) {
        let _jobs = self.jobs.lock();
        self.work_ready.notify_all();
    }
}

/// Runs submitted closures on a fixed set of threads.
///
/// Jobs must only touch state they own; the pool adds no locking around
/// them. Dropping the pool stops the workers once their current job ends.
pub struct WorkerPool {
    shared: Arc<Shared>,
    shutdown: CancelToken,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        Self::build(num_workers, false)
    }

    /// Like [`WorkerPool::new`], pinning worker `i` to core `i` when possible
    pub fn pinned(num_workers: usize) -> Self {
        Self::build(num_workers, true)
    }

    fn build(num_workers: usize, pin: bool) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            pending: AtomicUsize::new(0),
            completion: Mutex::new(()),
            all_done: Condvar::new(),
        });
        let shutdown = CancelToken::new();

        let cores = if pin {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let workers = (0..num_workers.max(1))
            .filter_map(|worker_id| {
                let shared = shared.clone();
                let shutdown = shutdown.clone();
                let core = cores.get(worker_id).copied();

                thread::Builder::new()
                    .name(format!("tracker-worker-{}", worker_id))
                    .spawn(move || {
                        if let Some(core) = core {
                            if !core_affinity::set_for_current(core) {
                                warn!("Could not pin worker {} to core {:?}", worker_id, core);
                            }
                        }
                        debug!("Tracker worker {} started", worker_id);
                        Self::work(&shared, &shutdown);
                        debug!("Tracker worker {} stopped", worker_id);
                    })
                    .map_err(|e| warn!("Failed to spawn tracker worker {}: {}", worker_id, e))
                    .ok()
            })
            .collect();

        Self {
            shared,
            shutdown,
            workers,
        }
    }

    fn work(shared: &Arc<Shared>, shutdown: &CancelToken) {
        let _registration = shutdown.register(shared.clone());

        loop {
            let job = {
                let mut jobs = shared.jobs.lock();
                loop {
                    if shutdown.is_cancelled() {
                        return;
                    }
                    if let Some(job) = jobs.pop_front() {
                        break job;
                    }
                    shared.work_ready.wait(&mut jobs);
                }
            };

            job();

            // Last pending job wakes wait_all()
            if shared.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _guard = shared.completion.lock();
                shared.all_done.notify_all();
            }
        }
    }

    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.jobs.lock().push_back(Box::new(job));
        self.shared.work_ready.notify_one();
    }

    /// Wait until every submitted job has finished or `timeout` passes.
    ///
    /// Returns whether all jobs finished. Jobs still running keep running.
    pub fn wait_all(&self, timeout: Duration) -> bool {
        let mut guard = self.shared.completion.lock();
        if self.pending() == 0 {
            return true;
        }
        self.shared
            .all_done
            .wait_while_for(&mut guard, |_| self.pending() != 0, timeout);
        self.pending() == 0
    }

    /// Jobs submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
