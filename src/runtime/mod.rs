//! Primitives that generated query programs call into: row merging, result
//! normalization, hash joins, fan-in barriers, and task dispatch.
pub mod barrier;
pub mod context;
pub mod diagnostics;
pub mod failure;
pub mod join;
pub mod pool;
mod row;

pub use barrier::{Accumulator, Arrival, Continuation, JoinBarrier};
pub use context::Runtime;
pub use failure::{FailureCollector, FailureHandler, FailureKind, LogFailures, TaskFailure};
pub use join::{distinct_keys, field_key, JoinType};
pub use pool::{WorkerPool, WorkerPoolBuilder};
pub use row::{merge, merged, normalize};
