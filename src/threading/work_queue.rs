//! Background work execution with main-thread completion draining.
//!
//! Heightmap and mesh generation are fire-and-forget: a producer runs on
//! a worker, its result is queued under a mutex, and the consuming loop
//! collects whatever has finished on its next tick. The main loop never
//! blocks on a worker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;

use once_cell::sync::OnceCell;
use rayon::ThreadPoolBuilder;
use tracing::info;

type Job = Box<dyn FnOnce() + Send>;

/// Strategy for running submitted producers. Kept behind a trait so the
/// unbounded spawner can be swapped for a bounded pool without touching
/// any chunk or streamer code.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// One OS thread per submission. No pooling, no priority, no bound on
/// outstanding work; a fast-moving viewer can pile up requests. Accepted
/// trade-off, see `PooledDispatcher` for the bounded alternative.
pub struct SpawnDispatcher;

impl Dispatcher for SpawnDispatcher {
    fn dispatch(&self, job: Job) {
        thread::spawn(job);
    }
}

/// Bounded worker pool backed by rayon.
pub struct PooledDispatcher {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl PooledDispatcher {
    /// Create a pool with the given number of threads. A size of 0 picks
    /// a default: all CPUs minus one for the main loop, at least one.
    pub fn new(size: usize) -> Self {
        let num_threads = if size > 0 {
            size
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("terrain-worker-{i}"))
            .build()
            .expect("failed to build worker thread pool");
        info!(num_threads, "created terrain worker pool");
        PooledDispatcher { pool, num_threads }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl Dispatcher for PooledDispatcher {
    fn dispatch(&self, job: Job) {
        self.pool.spawn(job);
    }
}

static GLOBAL_POOL: OnceCell<Arc<PooledDispatcher>> = OnceCell::new();

/// Shared default pool, sized on first use.
pub fn global_worker_pool() -> Arc<PooledDispatcher> {
    Arc::clone(GLOBAL_POOL.get_or_init(|| Arc::new(PooledDispatcher::new(0))))
}

/// Completion queue between workers and the consuming loop.
///
/// `submit` hands the producer to the dispatcher; when it finishes, the
/// callback is bound to the produced value and appended to a FIFO.
/// `drain`, called once per iteration of the consuming loop, pops and
/// invokes every completed callback on the calling thread. Callbacks run
/// in completion order, not submission order; workers may finish out of
/// order.
pub struct WorkQueue {
    dispatcher: Arc<dyn Dispatcher>,
    completed: Arc<Mutex<VecDeque<Job>>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(SpawnDispatcher))
    }

    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatcher>) -> Self {
        WorkQueue {
            dispatcher,
            completed: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Run `producer` on a worker; queue `on_complete(result)` for the
    /// next drain. Cancellation is not supported: once submitted, the
    /// producer always runs to completion and its result is delivered.
    pub fn submit<T, F, C>(&self, producer: F, on_complete: C)
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let completed = Arc::clone(&self.completed);
        self.dispatcher.dispatch(Box::new(move || {
            let data = producer();
            let callback: Job = Box::new(move || on_complete(data));
            completed.lock().unwrap().push_back(callback);
        }));
    }

    /// Invoke every queued completion callback on the calling thread.
    /// Must only ever be called from the single consuming thread; all
    /// mutation of render-facing state happens inside these callbacks.
    /// Returns the number of callbacks run.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        loop {
            // Pop one at a time so a callback can submit follow-up work
            // without holding the queue lock.
            let next = self.completed.lock().unwrap().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Completed results waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.completed.lock().unwrap().len()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
