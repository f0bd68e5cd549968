//! Collector liveness and progress

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Counters shared between the collector task and its observers
#[derive(Debug, Default)]
pub struct CollectorStatus {
    running: AtomicBool,
    cycles: AtomicU64,
    stored: AtomicU64,
    fetch_failures: AtomicU64,
    store_failures: AtomicU64,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of [`CollectorStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct CollectorSnapshot {
    pub running: bool,
    pub cycles: u64,
    pub stored: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl CollectorStatus {
    /// Whether the collector task is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        CollectorSnapshot {
            running: self.is_running(),
            cycles: self.cycles.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            last_success: self.last_success.lock().map(|t| *t).unwrap_or(None),
            last_error: self.last_error.lock().map(|e| e.clone()).unwrap_or(None),
        }
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stored(&self, at: DateTime<Utc>) {
        self.stored.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_success.lock() {
            *last = Some(at);
        }
    }

    pub(crate) fn record_fetch_failure(&self, message: String) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(message);
    }

    pub(crate) fn record_store_failure(&self, message: String) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(message);
    }

    fn set_last_error(&self, message: String) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message);
        }
    }
}

/// Marks the collector as running until dropped
///
/// Lives inside the spawned task, so it is dropped when the task returns,
/// panics or is aborted.
pub(crate) struct RunningGuard(Arc<CollectorStatus>);

impl RunningGuard {
    pub(crate) fn new(status: Arc<CollectorStatus>) -> Self {
        status.running.store(true, Ordering::Release);
        Self(status)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

/// Handle to the spawned collector task
#[derive(Debug)]
pub struct CollectorHandle {
    pub(crate) status: Arc<CollectorStatus>,
    pub(crate) task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Shared status, suitable for handing to health checks
    pub fn status(&self) -> Arc<CollectorStatus> {
        Arc::clone(&self.status)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task (tests and shutdown only)
    pub fn abort(&self) {
        self.task.abort();
    }
}
