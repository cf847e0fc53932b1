//! Bounded task pool.
//!
//! A fixed set of worker threads consumes a bounded submission queue;
//! submitting blocks once the queue is full (back-pressure) instead of
//! spawning unbounded workers. Before/after hooks run around every unit.
//!
//! Failure policy: after the first unit fails, units not yet dispatched
//! are skipped, but units already dispatched run to completion. There is
//! no cooperative cancellation of in-flight work.

use crate::error::{EngineError, EngineResult};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

type Task = Box<dyn FnOnce() -> EngineResult<()> + Send>;
type Hook = Arc<dyn Fn() -> EngineResult<()> + Send + Sync>;

struct PoolShared {
    pending: Mutex<usize>,
    all_done: Condvar,
    failed: AtomicBool,
    first_error: Mutex<Option<EngineError>>,
    before_hooks: RwLock<Vec<Hook>>,
    after_hooks: RwLock<Vec<Hook>>,
}

impl PoolShared {
    fn record_error(&self, error: EngineError) {
        // Only the first failure is kept.
        if !self.failed.swap(true, Ordering::SeqCst) {
            *self.first_error.lock() = Some(error);
        }
    }

    fn task_finished(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.all_done.notify_all();
        }
    }
}

/// A fixed-size worker pool with a bounded submission queue.
pub struct TaskPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
}

impl TaskPool {
    /// Creates a pool with `workers` threads and a queue of the same size.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = crossbeam_channel::bounded::<Task>(workers);
        let shared = Arc::new(PoolShared {
            pending: Mutex::new(0),
            all_done: Condvar::new(),
            failed: AtomicBool::new(false),
            first_error: Mutex::new(None),
            before_hooks: RwLock::new(Vec::new()),
            after_hooks: RwLock::new(Vec::new()),
        });

        let handles = (0..workers)
            .map(|_| {
                let receiver: Receiver<Task> = receiver.clone();
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for task in receiver.iter() {
                        Self::run_one(&shared, task);
                    }
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: handles,
            shared,
        }
    }

    fn run_one(shared: &PoolShared, task: Task) {
        // Skip units dispatched after the first failure.
        if shared.failed.load(Ordering::SeqCst) {
            shared.task_finished();
            return;
        }

        let result = Self::run_with_hooks(shared, task);
        if let Err(error) = result {
            warn!(%error, "pooled task failed; skipping undispatched work");
            shared.record_error(error);
        }
        shared.task_finished();
    }

    fn run_with_hooks(shared: &PoolShared, task: Task) -> EngineResult<()> {
        for hook in shared.before_hooks.read().iter() {
            hook()?;
        }
        task()?;
        for hook in shared.after_hooks.read().iter() {
            hook()?;
        }
        Ok(())
    }

    /// Attaches a hook that runs before every unit.
    pub fn add_before_hook(&self, hook: impl Fn() -> EngineResult<()> + Send + Sync + 'static) {
        self.shared.before_hooks.write().push(Arc::new(hook));
    }

    /// Attaches a hook that runs after every unit (e.g. progress updates).
    pub fn add_after_hook(&self, hook: impl Fn() -> EngineResult<()> + Send + Sync + 'static) {
        self.shared.after_hooks.write().push(Arc::new(hook));
    }

    /// Submits a unit of work.
    ///
    /// Blocks while the queue is full. After the first failure new
    /// submissions are dropped until the batch is drained by [`wait`].
    ///
    /// [`wait`]: TaskPool::wait
    pub fn submit(&self, task: impl FnOnce() -> EngineResult<()> + Send + 'static) {
        if self.shared.failed.load(Ordering::SeqCst) {
            return;
        }
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        {
            let mut pending = self.shared.pending.lock();
            *pending += 1;
        }
        if sender.send(Box::new(task)).is_err() {
            // Workers are gone; undo the accounting.
            self.shared.task_finished();
        }
    }

    /// Blocks until every submitted unit has finished, then returns the
    /// first error, if any. The error and the failure flag are consumed,
    /// so the pool accepts a fresh batch afterwards.
    pub fn wait(&self) -> EngineResult<()> {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.all_done.wait(&mut pending);
        }
        drop(pending);

        let error = self.shared.first_error.lock().take();
        self.shared.failed.store(false, Ordering::SeqCst);
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
