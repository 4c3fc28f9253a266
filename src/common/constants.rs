// JoinBarrier
pub const EMPTY_BARRIER_MSG: &str = "A join barrier must wait for at least one arrival.";
pub const BARRIER_CONTINUATION_TAKEN_MSG: &str =
    "Barrier reached zero but its continuation was already consumed.";

// WorkerPool
pub const ZERO_WORKERS_MSG: &str = "A worker pool needs at least one worker thread.";
pub const ZERO_QUEUE_CAPACITY_MSG: &str =
    "A bounded worker queue needs a capacity of at least one task.";
pub const WORKER_SPAWN_ERR_MSG: &str = "Could not spawn worker thread.";
pub const UNKNOWN_PANIC_MSG: &str = "task panicked with a non-string payload";

// Diagnostics
pub const DIAGNOSTIC_TARGET: &str = "queryrt::diagnostic";
