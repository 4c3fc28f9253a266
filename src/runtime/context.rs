use crate::common::Result;
use crate::config::RuntimeConfig;
use crate::runtime::barrier::{Accumulator, JoinBarrier};
use crate::runtime::join::{self, JoinType};
use crate::runtime::pool::WorkerPool;
use crate::runtime::{diagnostics, row};
use crate::types::{Record, SourceResult, Table};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// The handle a generated program runs against.
///
/// Bundles the shared worker pool with the runtime's free functions so the
/// program receives everything through one explicitly passed value. Clones
/// share the same pool.
#[derive(Clone, Debug)]
pub struct Runtime {
    pool: Arc<WorkerPool>,
}

impl Runtime {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    /// Builds a runtime with its own pool, sized by `config`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(WorkerPool::from_config(config)?)))
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Launches a branch: `f(args)` runs later on a pool worker.
    pub fn start<F, A>(&self, f: F, args: A) -> Result<()>
    where
        F: FnOnce(A) -> Result<()> + Send + 'static,
        A: Send + 'static,
    {
        self.pool.submit(f, args)
    }

    /// Creates a join point that runs `continuation` once `arrivals`
    /// branches have reported.
    pub fn create_join<F>(&self, arrivals: usize, continuation: F) -> Result<Accumulator>
    where
        F: FnOnce(Record) + Send + 'static,
    {
        JoinBarrier::new(arrivals, continuation)
    }

    /// Hash-joins two tables; `inner` drops unmatched left rows.
    pub fn join<K, L, R>(
        &self,
        inner: bool,
        left_key: L,
        right_key: R,
        left: &[Record],
        right: &[Record],
    ) -> Result<Table>
    where
        K: Hash + Eq,
        L: Fn(&Record) -> Result<K>,
        R: Fn(&Record) -> Result<K>,
    {
        join::hash(JoinType::from_inner(inner), left_key, right_key, left, right)
    }

    pub fn normalize(&self, result: impl Into<SourceResult>) -> Table {
        row::normalize(result)
    }

    pub fn merge(&self, target: &mut Record, source: &Record) {
        row::merge(target, source)
    }

    pub fn log(&self, message: impl Display) {
        diagnostics::log(message)
    }
}
