//! Bounded pool of detached background jobs.

use super::CancellationToken;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Maximum number of jobs running at once.
    pub max_concurrent: usize,
    /// Jobs spawned and not yet finished (queued or running).
    pub in_flight: usize,
    /// Jobs currently holding a permit.
    pub running: usize,
}

/// Removes a job's bookkeeping when its task ends, including by panic.
struct JobGuard {
    name: String,
    jobs: Arc<DashMap<String, Arc<CancellationToken>>>,
    running: Arc<AtomicUsize>,
    holds_permit: bool,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.holds_permit {
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
        self.jobs.remove(&self.name);
    }
}

/// A pool of named background jobs.
///
/// At most `max_concurrent` jobs run at once; the rest wait for a permit.
/// Every job gets its own [`CancellationToken`], and shutting the pool down
/// cancels all of them. Jobs are expected to finish promptly once their token
/// is cancelled.
pub struct JobPool {
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    jobs: Arc<DashMap<String, Arc<CancellationToken>>>,
    running: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobPool {
    /// Creates a pool running at most `max_concurrent` jobs at once.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            shutdown: CancellationToken::new(),
            jobs: Arc::new(DashMap::new()),
            running: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns a job under `name` and returns its cancellation token.
    ///
    /// The job receives the same token. If the pool is already shutting down
    /// the token is cancelled before the job starts, so the job still runs
    /// (and can record its own cancellation) but should exit immediately.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, job: F) -> Arc<CancellationToken>
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = Arc::new(CancellationToken::new());
        self.jobs.insert(name.clone(), token.clone());

        // Checked after insertion so a concurrent shutdown cannot miss this job.
        if self.shutdown.is_cancelled() {
            token.cancel(self.shutdown_reason());
        }

        let permits = self.permits.clone();
        let jobs = self.jobs.clone();
        let running = self.running.clone();
        let job_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut guard = JobGuard {
                name,
                jobs,
                running,
                holds_permit: false,
            };

            let _permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                () = job_token.cancelled() => None,
            };
            if _permit.is_some() {
                guard.running.fetch_add(1, Ordering::SeqCst);
                guard.holds_permit = true;
            }

            job(job_token).await;
            drop(guard);
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);

        token
    }

    /// Cancels the job registered under `name`.
    ///
    /// Returns false if no such job is in flight.
    pub fn cancel(&self, name: &str, reason: &str) -> bool {
        match self.jobs.get(name) {
            Some(token) => {
                token.cancel(reason);
                true
            }
            None => false,
        }
    }

    /// Returns true if a job named `name` is queued or running.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Returns the number of queued or running jobs.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    /// Returns a snapshot of pool occupancy.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_concurrent: self.max_concurrent,
            in_flight: self.jobs.len(),
            running: self.running.load(Ordering::SeqCst),
        }
    }

    /// Cancels every job and waits up to `grace` for them to finish.
    ///
    /// Returns the number of jobs still in flight when the wait ended.
    pub async fn shutdown(&self, reason: &str, grace: Duration) -> usize {
        self.shutdown.cancel(reason);
        for entry in self.jobs.iter() {
            entry.value().cancel(reason);
        }

        let handles: Vec<_> = {
            let mut h = self.handles.lock();
            std::mem::take(&mut *h)
        };

        match tokio::time::timeout(grace, futures::future::join_all(handles)).await {
            Ok(results) => {
                for join_error in results.into_iter().filter_map(Result::err) {
                    tracing::error!(error = %join_error, "Background job panicked");
                }
            }
            Err(_) => {
                tracing::warn!(
                    remaining = self.jobs.len(),
                    grace_ms = grace.as_millis() as u64,
                    "Background jobs did not finish within the grace period"
                );
            }
        }

        self.jobs.len()
    }

    fn shutdown_reason(&self) -> String {
        self.shutdown
            .reason()
            .unwrap_or_else(|| "service shutting down".to_string())
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl std::fmt::Debug for JobPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPool")
            .field("stats", &self.stats())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
