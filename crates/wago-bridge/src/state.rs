//! Per-instance bridge state, carried as the wasmtime store's data.
//!
//! All mutable bridging state lives here rather than in globals, so
//! multiple instances in one process stay independent.

use std::time::Instant;

use wasmtime::{Memory, TypedFunc};

use wago_value::HostValue;

use crate::error::BridgeError;
use crate::refs::RefTable;
use crate::timeout::TimeoutQueue;

/// State shared by every host import of one guest instance.
pub struct Bridge {
    /// Value slot table; seeded with the well-known constants plus the
    /// global and bridge objects.
    pub refs: RefTable,
    /// Pending guest wake-up registrations.
    pub timeouts: TimeoutQueue,
    /// The global object the guest resolves names against (id 5).
    pub globals: HostValue,
    /// The bridge object carrying `_pendingEvent` and the wrapper
    /// factory (id 6).
    pub bridge_obj: HostValue,
    /// Set once the guest requests termination; sticky.
    pub exit_code: Option<i32>,
    /// The guest's exported linear memory, bound after instantiation.
    pub memory: Option<Memory>,
    /// Guest re-entry point, bound after instantiation.
    pub resume_fn: Option<TypedFunc<(), ()>>,
    /// Current stack pointer query, bound after instantiation.
    pub getsp_fn: Option<TypedFunc<(), i32>>,
    /// Monotonic epoch for the guest's nanosecond clock.
    pub started: Instant,
}

impl Bridge {
    pub fn new(globals: HostValue, bridge_obj: HostValue) -> Self {
        Self {
            refs: RefTable::new(globals.clone(), bridge_obj.clone()),
            timeouts: TimeoutQueue::new(),
            globals,
            bridge_obj,
            exit_code: None,
            memory: None,
            resume_fn: None,
            getsp_fn: None,
            started: Instant::now(),
        }
    }

    pub fn has_exited(&self) -> bool {
        self.exit_code.is_some()
    }

    /// Record guest termination and drop state the guest can no longer
    /// reach. The first exit code wins.
    pub fn mark_exited(&mut self, code: i32) {
        if self.exit_code.is_none() {
            if code != 0 {
                log::warn!("exit code: {code}");
            }
            self.exit_code = Some(code);
        }
        self.timeouts.clear_all();
        self.refs.reset();
    }

    pub fn memory(&self) -> Result<Memory, BridgeError> {
        self.memory.ok_or(BridgeError::MemoryNotInitialized)
    }

    /// Nanoseconds of monotonic time since this bridge was created.
    pub fn monotonic_nanos(&self) -> i64 {
        self.started.elapsed().as_nanos() as i64
    }
}
