//! Fixed-size worker pool draining one FIFO of crawl jobs.
//!
//! All queue state lives behind a single mutex. Workers sleep on `wake`
//! while the queue is empty; callers waiting for the crawl to settle sleep
//! on `idle`. Shutdown is cooperative: the flag is raised, everyone is
//! woken, and each worker keeps taking jobs until the queue is empty.

use crate::job::CrawlJob;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Executes one job and returns the children to enqueue.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: CrawlJob) -> Vec<CrawlJob>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub processed: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<CrawlJob>,
    active: usize,
    shutdown: bool,
    stats: PoolStats,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.active == 0
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
    idle: Condvar,
}

pub struct CrawlPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl CrawlPool {
    pub fn start(num_workers: usize, runner: Arc<dyn JobRunner>) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let mut pool = CrawlPool { shared, workers: Vec::with_capacity(num_workers) };
        for i in 0..num_workers.max(1) {
            let shared = pool.shared.clone();
            let runner = runner.clone();
            let handle = thread::Builder::new()
                .name(format!("crawl-worker-{i}"))
                .spawn(move || worker_loop(&shared, runner.as_ref()))?;
            pool.workers.push(handle);
        }
        tracing::info!(workers = pool.workers.len(), "crawl pool started");
        Ok(pool)
    }

    pub fn submit(&self, job: CrawlJob) {
        let mut state = self.shared.state.lock();
        state.jobs.push_back(job);
        self.shared.wake.notify_one();
    }

    /// Jobs waiting in the queue, not counting those in flight.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Block until the queue is empty and no job is running, or `timeout` passes.
    /// Returns whether the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }

    /// Raise the shutdown flag, let workers drain the queue, and join them.
    pub fn shutdown(mut self) -> PoolStats {
        self.stop_and_join();
        self.shared.state.lock().stats
    }

    fn stop_and_join(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.wake.notify_all();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("crawl worker exited abnormally");
            }
        }
    }
}

impl Drop for CrawlPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_and_join();
        }
    }
}

fn worker_loop(shared: &Shared, runner: &dyn JobRunner) {
    let mut state = shared.state.lock();
    loop {
        if let Some(job) = state.jobs.pop_front() {
            state.active += 1;
            let (children, panicked) = MutexGuard::unlocked(&mut state, || run_guarded(runner, job));
            state.active -= 1;
            state.stats.processed += 1;
            if panicked {
                state.stats.panicked += 1;
            }
            if !children.is_empty() {
                state.jobs.extend(children);
                shared.wake.notify_all();
            }
            if state.is_idle() {
                shared.idle.notify_all();
            }
        } else if state.shutdown {
            break;
        } else {
            shared.wake.wait(&mut state);
        }
    }
}

/// A panicking job is logged and yields no children; the worker carries on.
fn run_guarded(runner: &dyn JobRunner, job: CrawlJob) -> (Vec<CrawlJob>, bool) {
    let url = job.link.to_string();
    match panic::catch_unwind(AssertUnwindSafe(|| runner.run(job))) {
        Ok(children) => (children, false),
        Err(_) => {
            tracing::warn!(%url, "crawl job panicked");
            (Vec::new(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::Link;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(path: &str, depth: u32) -> CrawlJob {
        CrawlJob::new(Link::parse(&format!("http://pool.test{path}")).unwrap(), depth)
    }

    /// Each job fans out into `fanout` children until depth runs out.
    struct FanOut {
        fanout: usize,
        runs: AtomicUsize,
    }

    impl JobRunner for FanOut {
        fn run(&self, job: CrawlJob) -> Vec<CrawlJob> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if job.depth == 0 {
                return Vec::new();
            }
            (0..self.fanout)
                .map(|i| job.child(Link::parse(&format!("http://pool.test/{i}")).unwrap()))
                .collect()
        }
    }

    struct Panicky;

    impl JobRunner for Panicky {
        fn run(&self, job: CrawlJob) -> Vec<CrawlJob> {
            if job.link.path == "/boom" {
                panic!("boom");
            }
            Vec::new()
        }
    }

    #[test]
    fn depth_bounds_the_fan_out() {
        let runner = Arc::new(FanOut { fanout: 3, runs: AtomicUsize::new(0) });
        let pool = CrawlPool::start(4, runner.clone()).unwrap();
        pool.submit(job("/", 2));
        assert!(pool.wait_idle(Duration::from_secs(10)));
        assert_eq!(pool.queued(), 0);
        let stats = pool.shutdown();
        // 1 + 3 + 9
        assert_eq!(runner.runs.load(Ordering::SeqCst), 13);
        assert_eq!(stats.processed, 13);
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let runner = Arc::new(FanOut { fanout: 0, runs: AtomicUsize::new(0) });
        let pool = CrawlPool::start(2, runner.clone()).unwrap();
        for i in 0..50 {
            pool.submit(job(&format!("/{i}"), 0));
        }
        let stats = pool.shutdown();
        assert_eq!(stats.processed, 50);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = CrawlPool::start(1, Arc::new(Panicky)).unwrap();
        pool.submit(job("/boom", 0));
        pool.submit(job("/fine", 0));
        assert!(pool.wait_idle(Duration::from_secs(10)));
        let stats = pool.shutdown();
        assert_eq!(stats, PoolStats { processed: 2, panicked: 1 });
    }

    #[test]
    fn idle_pool_reports_idle_immediately() {
        let pool = CrawlPool::start(2, Arc::new(Panicky)).unwrap();
        assert!(pool.wait_idle(Duration::from_millis(10)));
        pool.shutdown();
    }
}
