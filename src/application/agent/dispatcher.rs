//! Bounded-concurrency job dispatcher
//!
//! Send jobs are fanned out through a fixed pool of slots (a semaphore sized
//! to the configured rate limit), so at most `rate_limit` transmissions are in
//! flight at any instant. Jobs may finish out of submission order.
//!
//! Lifecycle: `Idle -> Running -> Draining -> Closed`. `close` stops handing
//! out slots; submitters still waiting for a slot return
//! [`DispatchError::Closed`], while jobs that already hold one run to
//! completion (`Draining`).
//!
//! A failing job releases its slot like any other and is never retried here.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatcher is already running")]
    AlreadyRunning,

    #[error("Dispatcher has not been started")]
    NotRunning,

    #[error("Dispatcher is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Running,
    /// Closed for new work, jobs still in flight
    Draining,
    Closed,
}

/// What happened to a submitted job
#[derive(Debug)]
pub enum JobOutcome {
    Completed,
    Failed(anyhow::Error),
    /// The cancellation signal fired before a slot was free; the job never ran
    Cancelled,
}

enum Pool {
    Idle,
    Running(Arc<Semaphore>),
    Closed,
}

pub struct Dispatcher {
    rate_limit: usize,
    pool: Mutex<Pool>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count even if the job panics
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new(rate_limit: usize) -> Self {
        Self {
            rate_limit: rate_limit.max(1),
            pool: Mutex::new(Pool::Idle),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn rate_limit(&self) -> usize {
        self.rate_limit
    }

    /// Number of jobs currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn lock_pool(&self) -> std::sync::MutexGuard<'_, Pool> {
        // The pool holds no invariants a panicking holder could break
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> DispatcherState {
        match &*self.lock_pool() {
            Pool::Idle => DispatcherState::Idle,
            Pool::Running(_) => DispatcherState::Running,
            Pool::Closed if self.in_flight() > 0 => DispatcherState::Draining,
            Pool::Closed => DispatcherState::Closed,
        }
    }

    /// Allocate the slot pool. Only an idle dispatcher can start; `Closed`
    /// is terminal, so jobs still draining never share the budget with a
    /// second pool.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut pool = self.lock_pool();
        match *pool {
            Pool::Idle => {}
            Pool::Running(_) => return Err(DispatchError::AlreadyRunning),
            Pool::Closed => return Err(DispatchError::Closed),
        }
        *pool = Pool::Running(Arc::new(Semaphore::new(self.rate_limit)));
        info!("Dispatcher started with {} slots", self.rate_limit);
        Ok(())
    }

    /// Run `job` once a slot is free.
    ///
    /// Returns `JobOutcome::Cancelled` without running the job if `cancel`
    /// fires first. Job errors are handed back to the caller.
    pub async fn submit<F>(
        &self,
        job: F,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, DispatchError>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        let semaphore = match &*self.lock_pool() {
            Pool::Running(semaphore) => semaphore.clone(),
            Pool::Idle => return Err(DispatchError::NotRunning),
            Pool::Closed => return Err(DispatchError::Closed),
        };

        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Job dropped: cancelled while waiting for a slot");
                return Ok(JobOutcome::Cancelled);
            }
            permit = semaphore.acquire_owned() => {
                permit.map_err(|_| DispatchError::Closed)?
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlightGuard(self.in_flight.clone());
        let result = job.await;
        drop(permit);

        Ok(match result {
            Ok(()) => JobOutcome::Completed,
            Err(e) => {
                warn!("Dispatched job failed: {:#}", e);
                JobOutcome::Failed(e)
            }
        })
    }

    /// Stop handing out slots and wake every waiting submitter
    pub fn close(&self) {
        let mut pool = self.lock_pool();
        if let Pool::Running(semaphore) = &*pool {
            semaphore.close();
            info!(
                "Dispatcher closed ({} jobs still in flight)",
                self.in_flight()
            );
        }
        *pool = Pool::Closed;
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}
