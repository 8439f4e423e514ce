//! Bridge error types.

use wago_value::FaultError;

/// Errors raised by the bridge core.
///
/// All of these are tier-2 failures in the bridge's error model: they
/// indicate corrupted bridge state or a guest/host protocol mismatch and
/// surface as wasm traps, terminating the current host call stack. Errors
/// a guest is meant to observe travel as thrown host values instead and
/// never appear here.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A handler ran before the memory view was bound, or after it was
    /// torn down on exit.
    #[error("guest memory view not initialized")]
    MemoryNotInitialized,

    /// A (pointer, length) pair escaped the guest's linear memory.
    #[error("guest memory access out of bounds: {addr:#x}..+{len}")]
    OutOfBounds { addr: u64, len: u64 },

    /// The guest presented a reference id with no live table entry.
    #[error("unknown reference id {0}")]
    BadRef(u32),

    /// `runtime.wasmWrite` to a descriptor the host does not forward.
    #[error("wasmWrite to unsupported file descriptor {0}")]
    InvalidFd(i64),

    /// A required guest export (`mem`, `run`, `resume`, `getsp`) is
    /// missing or has the wrong type.
    #[error("guest export `{0}` missing or mistyped")]
    MissingExport(&'static str),

    /// Value-layer fault (wrong receiver type, re-entry after exit).
    #[error(transparent)]
    Fault(#[from] FaultError),

    /// Host I/O failure while forwarding guest output.
    #[error("host io error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-level failure (instantiation, trap, mistyped entry point).
    #[error("engine error: {0}")]
    Engine(String),
}

impl From<wasmtime::Error> for BridgeError {
    fn from(err: wasmtime::Error) -> Self {
        BridgeError::Engine(format!("{err:#}"))
    }
}
