//! Bridge fault types.
//!
//! A `FaultError` is an internal-contract violation: bad state, a type
//! where the operation's calling convention demands another, or re-entry
//! into a guest that already exited. Faults terminate the current host
//! call stack (they surface as wasm traps in the bridge); they are never
//! converted into guest-visible error values. Guest-visible errors travel
//! as thrown [`HostValue`]s instead — see [`crate::scope::CallError`].

/// Fatal bridge errors. Not recoverable in place.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FaultError {
    /// The guest program has already exited; no further entry is legal.
    #[error("guest program has already exited")]
    Exited,

    /// The guest trapped or the engine rejected a re-entry call.
    #[error("guest trap: {0}")]
    Guest(String),

    /// A host/guest protocol violation (wrong receiver type, missing
    /// state, out-of-bounds access).
    #[error("bridge contract violation: {0}")]
    Contract(String),
}

impl FaultError {
    /// Shorthand for a contract violation with a formatted message.
    pub fn contract(msg: impl Into<String>) -> Self {
        FaultError::Contract(msg.into())
    }
}
