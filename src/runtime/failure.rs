use crate::common::constants::UNKNOWN_PANIC_MSG;
use crate::common::Error;
use std::any::Any;
use std::sync::{Mutex, PoisonError};

/// Why a dispatched task did not complete.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureKind {
    /// The task returned an error.
    Error(Error),
    /// The task panicked; holds the panic message.
    Panic(String),
}

/// A fault caught at the worker pool boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskFailure {
    /// Name of the worker thread that ran the task.
    pub worker: String,
    pub kind: FailureKind,
}

impl TaskFailure {
    pub fn from_panic(worker: &str, payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => payload
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .unwrap_or_else(|| UNKNOWN_PANIC_MSG.to_string()),
        };
        Self {
            worker: worker.to_string(),
            kind: FailureKind::Panic(message),
        }
    }

    pub fn from_error(worker: &str, error: Error) -> Self {
        Self {
            worker: worker.to_string(),
            kind: FailureKind::Error(error),
        }
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FailureKind::Error(error) => write!(f, "task on {} failed: {error}", self.worker),
            FailureKind::Panic(message) => write!(f, "task on {} panicked: {message}", self.worker),
        }
    }
}

/// Receives faults from dispatched tasks. Called on the worker thread that
/// ran the failing task.
pub trait FailureHandler: Send + Sync {
    fn report(&self, failure: TaskFailure);
}

/// Logs failures and drops them. The default handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFailures;

impl FailureHandler for LogFailures {
    fn report(&self, failure: TaskFailure) {
        log::error!("{failure}");
    }
}

/// Logs failures and keeps them for later inspection.
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Mutex<Vec<TaskFailure>>,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the failures reported so far.
    pub fn failures(&self) -> Vec<TaskFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureHandler for FailureCollector {
    fn report(&self, failure: TaskFailure) {
        log::error!("{failure}");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payloads() {
        let owned = TaskFailure::from_panic("w-0", Box::new(String::from("boom")));
        assert_eq!(owned.kind, FailureKind::Panic("boom".to_string()));

        let borrowed = TaskFailure::from_panic("w-0", Box::new("bang"));
        assert_eq!(borrowed.kind, FailureKind::Panic("bang".to_string()));

        let opaque = TaskFailure::from_panic("w-0", Box::new(42_u8));
        assert_eq!(opaque.kind, FailureKind::Panic(UNKNOWN_PANIC_MSG.to_string()));
    }

    #[test]
    fn test_collector_keeps_failures() {
        let collector = FailureCollector::new();
        assert!(collector.is_empty());

        collector.report(TaskFailure::from_error("w-1", Error::PoolClosed));
        assert_eq!(collector.len(), 1);
        assert_eq!(
            collector.failures()[0].to_string(),
            "task on w-1 failed: worker pool is shut down"
        );
    }
}
