use crate::common::constants::{WORKER_SPAWN_ERR_MSG, ZERO_QUEUE_CAPACITY_MSG, ZERO_WORKERS_MSG};
use crate::common::{Error, Result};
use crate::config::config::DEFAULT_THREAD_NAME;
use crate::config::RuntimeConfig;
use crate::errinput;
use crate::runtime::failure::{FailureHandler, LogFailures, TaskFailure};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};


/// A deferred unit of work. Owns everything it needs to run.
type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

thread_local! {
    /// Identity of the pool that owns the current thread, if it is a worker.
    static WORKER_OF: Cell<Option<usize>> = Cell::new(None);
}

/// Task counters, shared between the pool handle and its workers.
#[derive(Debug, Default)]
struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// A fixed set of worker threads draining a shared task queue.
///
/// Tasks are fire-and-forget: nothing flows back to the submitter. A task that
/// returns an error or panics is reported to the pool's [`FailureHandler`] and
/// the worker moves on to the next task.
///
/// The pool is an ordinary value owned by whoever bootstraps the runtime; wrap
/// it in an `Arc` to share it between branches.
pub struct WorkerPool {
    /// Prefix of the worker thread names.
    name: String,
    /// Producer side of the task queue. `None` once the pool is closed.
    sender: RwLock<Option<Sender<Job>>>,
    /// Worker thread handles, drained on shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Maximum number of queued tasks, if bounded.
    queue_capacity: Option<usize>,
    stats: Arc<PoolStats>,
    /// Receives failures of tasks run inline on a worker.
    failure_handler: Arc<dyn FailureHandler>,
}

pub struct WorkerPoolBuilder {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    thread_name: String,
    failure_handler: Arc<dyn FailureHandler>,
}

impl Default for WorkerPoolBuilder {
    fn default() -> Self {
        Self {
            workers: None,
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            failure_handler: Arc::new(LogFailures),
        }
    }
}

impl WorkerPoolBuilder {
    pub fn workers(&mut self, workers: usize) -> &mut Self {
        self.workers = Some(workers);
        self
    }
    /// Bounds the task queue. Submissions from outside the pool block while it
    /// is full. A submission from one of the pool's own workers never blocks,
    /// since only workers drain the queue: when the queue is full the task
    /// runs inline on the submitting worker instead.
    pub fn queue_capacity(&mut self, capacity: usize) -> &mut Self {
        self.queue_capacity = Some(capacity);
        self
    }
    pub fn thread_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.thread_name = name.into();
        self
    }
    pub fn failure_handler(&mut self, handler: Arc<dyn FailureHandler>) -> &mut Self {
        self.failure_handler = handler;
        self
    }
    pub fn from_config(&mut self, config: &RuntimeConfig) -> &mut Self {
        self.workers = Some(config.resolved_workers());
        self.queue_capacity = config.queue_bound();
        self.thread_name = config.thread_name.clone();
        self
    }

    pub fn build(&self) -> Result<WorkerPool> {
        let workers = self
            .workers
            .unwrap_or_else(|| RuntimeConfig::default().resolved_workers());
        if workers == 0 {
            return errinput!("{}", ZERO_WORKERS_MSG);
        }
        if self.queue_capacity == Some(0) {
            return errinput!("{}", ZERO_QUEUE_CAPACITY_MSG);
        }

        WorkerPool::new(
            workers,
            self.queue_capacity,
            &self.thread_name,
            self.failure_handler.clone(),
        )
    }

    pub fn build_with_handle(&self) -> Result<Arc<WorkerPool>> {
        Ok(Arc::new(self.build()?))
    }
}

impl WorkerPool {
    fn new(
        workers: usize,
        queue_capacity: Option<usize>,
        name: &str,
        failure_handler: Arc<dyn FailureHandler>,
    ) -> Result<Self> {
        let (sender, receiver) = match queue_capacity {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };
        let stats = Arc::new(PoolStats::default());

        let handles = (0..workers)
            .map(|i| {
                let worker = format!("{name}-{i}");
                let receiver = receiver.clone();
                let stats = stats.clone();
                let handler = failure_handler.clone();
                thread::Builder::new()
                    .name(worker.clone())
                    .spawn(move || run_worker(worker, receiver, stats, handler))
                    .map_err(|e| Error::IO(format!("{WORKER_SPAWN_ERR_MSG} {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "started worker pool '{name}' with {workers} workers, queue {}",
            queue_capacity.map_or("unbounded".to_string(), |c| format!("bounded at {c}"))
        );
        Ok(Self {
            name: name.to_string(),
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(handles),
            queue_capacity,
            stats,
            failure_handler,
        })
    }

    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::default()
    }

    /// Builds a pool from the runtime configuration with the default failure handler.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Self::builder().from_config(config).build()
    }

    /// Submits `f(args)` to run on some worker at some later time.
    ///
    /// Returns as soon as the task is queued. If the queue is bounded and full,
    /// blocks until a worker frees a slot, or runs the task inline when called
    /// from one of this pool's workers; work is never discarded. Errors only if
    /// the pool has been closed.
    pub fn submit<F, A>(&self, f: F, args: A) -> Result<()>
    where
        F: FnOnce(A) -> Result<()> + Send + 'static,
        A: Send + 'static,
    {
        self.execute(move || f(args))
    }

    /// Submits a closure that already owns its arguments.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        // Clone the sender so a blocking send doesn't hold the lock.
        let sender = self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::PoolClosed)?;

        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        if !self.on_own_worker() {
            return sender.send(Box::new(job)).map_err(|_| {
                self.stats.submitted.fetch_sub(1, Ordering::SeqCst);
                Error::PoolClosed
            });
        }

        // A worker blocking on its own full queue would deadlock the pool.
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                let worker = thread::current().name().unwrap_or(&self.name).to_string();
                log::trace!(
                    "queue of pool '{}' is full, {worker} runs the task inline",
                    self.name
                );
                run_job(&worker, job, &self.stats, self.failure_handler.as_ref());
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.submitted.fetch_sub(1, Ordering::SeqCst);
                Err(Error::PoolClosed)
            }
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.stats) as usize
    }

    fn on_own_worker(&self) -> bool {
        WORKER_OF.with(|pool| pool.get() == Some(self.id()))
    }

    /// Stops accepting work. Queued tasks still run.
    pub fn close(&self) {
        if self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            log::debug!("closed worker pool '{}'", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Closes the pool and waits for the workers to drain the queue and exit.
    ///
    /// When called from one of the pool's own workers, that worker is not
    /// waited for.
    pub fn shutdown(&self) {
        self.close();

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::error!("a worker of pool '{}' exited abnormally", self.name);
            }
        }
        log::debug!(
            "shut down worker pool '{}': {} submitted, {} completed, {} failed",
            self.name,
            self.submitted(),
            self.completed(),
            self.failed()
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    /// Tasks accepted so far.
    pub fn submitted(&self) -> u64 {
        self.stats.submitted.load(Ordering::SeqCst)
    }

    /// Tasks that ran to completion without error.
    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::SeqCst)
    }

    /// Tasks that returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("queue_capacity", &self.queue_capacity)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Worker loop: runs tasks until the queue is closed and empty.
fn run_worker(
    name: String,
    receiver: Receiver<Job>,
    stats: Arc<PoolStats>,
    handler: Arc<dyn FailureHandler>,
) {
    WORKER_OF.with(|pool| pool.set(Some(Arc::as_ptr(&stats) as usize)));
    log::trace!("{name} started");
    for job in receiver.iter() {
        run_job(&name, job, &stats, handler.as_ref());
    }
    log::trace!("{name} exiting");
}

/// Runs one task, catching its panic and reporting any failure.
fn run_job(worker: &str, job: Job, stats: &PoolStats, handler: &dyn FailureHandler) {
    let failure = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {
            stats.completed.fetch_add(1, Ordering::SeqCst);
            return;
        }
        Ok(Err(error)) => TaskFailure::from_error(worker, error),
        Err(payload) => TaskFailure::from_panic(worker, payload),
    };
    stats.failed.fetch_add(1, Ordering::SeqCst);

    // The worker must outlive a misbehaving handler.
    let summary = failure.to_string();
    if panic::catch_unwind(AssertUnwindSafe(|| handler.report(failure))).is_err() {
        log::error!("failure handler panicked while reporting: {summary}");
    }
}
