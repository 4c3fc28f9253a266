use crate::common::constants::{BARRIER_CONTINUATION_TAKEN_MSG, EMPTY_BARRIER_MSG};
use crate::common::{Error, Result};
use crate::errinput;
use crate::runtime::row::merge;
use crate::types::Record;
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(test)]
mod tests;

/// Invoked once with the union of every branch's partial result.
pub type Continuation = Box<dyn FnOnce(Record) + Send + 'static>;

/// The outcome of a single arrival at a barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// The barrier is still waiting for `remaining` more arrivals.
    Pending { remaining: usize },
    /// This arrival was the last one and ran the continuation.
    Fired,
}

/// Mutable state of one join point.
struct BarrierState {
    /// Number of arrivals still expected.
    remaining: usize,
    /// Union of all partial results seen so far.
    accumulated: Record,
    /// Taken by the arrival that brings `remaining` to zero.
    continuation: Option<Continuation>,
}

/// An N-way fan-in point for concurrently completing branches.
///
/// Each branch reports its partial result through an [`Accumulator`]. The
/// arrival that completes the count runs the continuation with the merged
/// record, exactly once. Branches that arrive earlier return immediately
/// instead of waiting. There is no timeout: a barrier that never receives all
/// of its arrivals never fires.
pub struct JoinBarrier;

impl JoinBarrier {
    /// Creates a barrier expecting `arrivals` calls, returning the accumulator
    /// the branches report into.
    pub fn new<F>(arrivals: usize, continuation: F) -> Result<Accumulator>
    where
        F: FnOnce(Record) + Send + 'static,
    {
        if arrivals == 0 {
            return errinput!("{}", EMPTY_BARRIER_MSG);
        }
        Ok(Accumulator {
            expected: arrivals,
            state: Arc::new(Mutex::new(BarrierState {
                remaining: arrivals,
                accumulated: Record::new(),
                continuation: Some(Box::new(continuation)),
            })),
        })
    }
}

/// The handle branches report into. Cheap to clone and safe to call from any
/// thread.
#[derive(Clone)]
pub struct Accumulator {
    expected: usize,
    state: Arc<Mutex<BarrierState>>,
}

impl Accumulator {
    /// Merges `partial` into the accumulated record and counts one arrival,
    /// as a single atomic step. The arrival that brings the count to zero
    /// runs the continuation after releasing the barrier's lock, so the
    /// continuation may block or submit more work freely.
    ///
    /// Arriving after the barrier fired is a caller error: it returns
    /// `Error::BarrierExhausted` and leaves the barrier untouched.
    ///
    /// Fields supplied by several branches resolve by arrival order (last
    /// writer wins), which is not deterministic across threads.
    pub fn arrive(&self, partial: Record) -> Result<Arrival> {
        let (accumulated, continuation) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.remaining == 0 {
                log::warn!(
                    "join barrier over-arrival: already fired after {} arrivals, dropping {}",
                    self.expected,
                    partial
                );
                return Err(Error::BarrierExhausted {
                    expected: self.expected,
                });
            }

            merge(&mut state.accumulated, &partial);
            state.remaining -= 1;
            if state.remaining > 0 {
                return Ok(Arrival::Pending {
                    remaining: state.remaining,
                });
            }

            let continuation = state
                .continuation
                .take()
                .ok_or_else(|| Error::InvalidData(BARRIER_CONTINUATION_TAKEN_MSG.to_string()))?;
            (std::mem::take(&mut state.accumulated), continuation)
        };

        log::debug!(
            "join barrier fired after {} arrivals with {} fields",
            self.expected,
            accumulated.len()
        );
        continuation(accumulated);
        Ok(Arrival::Fired)
    }

    /// Number of arrivals still expected before the barrier fires.
    pub fn remaining(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining
    }

    /// Whether the last expected arrival has come in and run the continuation.
    pub fn has_fired(&self) -> bool {
        self.remaining() == 0
    }
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("expected", &self.expected)
            .field("remaining", &self.remaining())
            .finish()
    }
}
