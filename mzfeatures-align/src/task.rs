//! Status, progress and cancellation shared between a long running
//! computation and whoever schedules it.
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Waiting,
    Initializing,
    Processing,
    Finished,
    Error,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Canceled)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Waiting,
            1 => Self::Initializing,
            2 => Self::Processing,
            3 => Self::Finished,
            4 => Self::Error,
            _ => Self::Canceled,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Receives progress reports from a computation
pub trait ProgressSink: Send + Sync {
    fn set_status(&self, status: TaskStatus);

    fn set_error(&self, message: String);

    fn set_total(&self, total: usize);

    fn increment(&self, amount: usize);
}

/// A [`ProgressSink`] that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_status(&self, _status: TaskStatus) {}

    fn set_error(&self, _message: String) {}

    fn set_total(&self, _total: usize) {}

    fn increment(&self, _amount: usize) {}
}

/// A thread safe [`ProgressSink`] that can be polled from another thread
#[derive(Debug, Default)]
pub struct ProgressCounter {
    status: AtomicU8,
    total: AtomicUsize,
    processed: AtomicUsize,
    error: Mutex<Option<String>>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Acquire)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    /// The fraction of work done in `[0, 1]`, zero while the total is unknown
    pub fn finished_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.processed() as f64 / total as f64).min(1.0)
        }
    }
}

impl ProgressSink for ProgressCounter {
    fn set_status(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn set_error(&self, message: String) {
        if let Ok(mut e) = self.error.lock() {
            *e = Some(message);
        }
    }

    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Release);
    }

    fn increment(&self, amount: usize) {
        self.processed.fetch_add(amount, Ordering::AcqRel);
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn set_status(&self, status: TaskStatus) {
        (**self).set_status(status)
    }

    fn set_error(&self, message: String) {
        (**self).set_error(message)
    }

    fn set_total(&self, total: usize) {
        (**self).set_total(total)
    }

    fn increment(&self, amount: usize) {
        (**self).increment(amount)
    }
}

/// A cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = ProgressCounter::new();
        assert_eq!(counter.status(), TaskStatus::Waiting);
        assert_eq!(counter.finished_fraction(), 0.0);
        counter.set_total(4);
        counter.increment(1);
        counter.set_status(TaskStatus::Processing);
        assert_eq!(counter.finished_fraction(), 0.25);
        assert_eq!(counter.status(), TaskStatus::Processing);
        counter.set_error("boom".into());
        counter.set_status(TaskStatus::Error);
        assert!(counter.status().is_terminal());
        assert_eq!(counter.error_message().as_deref(), Some("boom"));
    }

    #[test]
    fn test_token_shared() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_canceled());
        token.cancel();
        assert!(other.is_canceled());
    }
}
