//! The writer/reader coordination primitive: a single mutex-protected
//! condition variable per queue instance that turns a polling file read
//! into a blocking queue read.
//!
//! File I/O itself happens outside the mutex; only the metadata snapshot
//! (`active segment id`, `durable size`, `last timestamp`, `closed`) is
//! guarded. No file lock is ever held across a wait.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub active_segment_id: u64,
    pub durable_size: u64,
    pub last_timestamp: i64,
    pub closed: bool,
    generation: u64,
}

/// Outcome of [`Coordination::wait_for_change`].
#[derive(Debug, Clone, Copy)]
pub enum WaitResult {
    Changed(Snapshot),
    TimedOut,
}

struct State {
    active_segment_id: u64,
    durable_size: u64,
    last_timestamp: i64,
    closed: bool,
    generation: u64,
}

pub struct Coordination {
    state: Mutex<State>,
    cvar: Condvar,
}

impl Coordination {
    pub fn new(active_segment_id: u64, durable_size: u64, last_timestamp: i64) -> Self {
        Self {
            state: Mutex::new(State {
                active_segment_id,
                durable_size,
                last_timestamp,
                closed: false,
                generation: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().expect("coordination mutex poisoned");
        Snapshot {
            active_segment_id: state.active_segment_id,
            durable_size: state.durable_size,
            last_timestamp: state.last_timestamp,
            closed: state.closed,
            generation: state.generation,
        }
    }

    /// Called by the writer after data bytes are flushed and the in-memory
    /// durable size has advanced past them — never before.
    pub fn publish(&self, active_segment_id: u64, durable_size: u64, last_timestamp: i64) {
        let mut state = self.state.lock().expect("coordination mutex poisoned");
        state.active_segment_id = active_segment_id;
        state.durable_size = durable_size;
        state.last_timestamp = last_timestamp;
        state.generation += 1;
        self.cvar.notify_all();
    }

    /// Called once by the writer on `Close`; wakes every waiting reader.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("coordination mutex poisoned");
        state.closed = true;
        state.generation += 1;
        self.cvar.notify_all();
    }

    /// Blocks until the state changes (a commit or a close) or `timeout`
    /// elapses, relative to the snapshot the caller last observed.
    /// `timeout = None` waits forever; `Some(Duration::ZERO)` returns
    /// immediately without blocking, matching `Reader.Read(timeout=0)`.
    pub fn wait_for_change(&self, since: &Snapshot, timeout: Option<Duration>) -> WaitResult {
        let state = self.state.lock().expect("coordination mutex poisoned");
        if state.generation != since.generation {
            return WaitResult::Changed(Self::snapshot_of(&state));
        }
        let state = match timeout {
            Some(Duration::ZERO) => return WaitResult::TimedOut,
            Some(timeout) => {
                let (state, _timeout_result) = self
                    .cvar
                    .wait_timeout_while(state, timeout, |s| s.generation == since.generation)
                    .expect("coordination mutex poisoned");
                state
            }
            None => self
                .cvar
                .wait_while(state, |s| s.generation == since.generation)
                .expect("coordination mutex poisoned"),
        };
        if state.generation == since.generation {
            WaitResult::TimedOut
        } else {
            WaitResult::Changed(Self::snapshot_of(&state))
        }
    }

    fn snapshot_of(state: &State) -> Snapshot {
        Snapshot {
            active_segment_id: state.active_segment_id,
            durable_size: state.durable_size,
            last_timestamp: state.last_timestamp,
            closed: state.closed,
            generation: state.generation,
        }
    }
}
