//! Host ABI bridge for Go-compiled WebAssembly modules.
//!
//! Guests built by the Go toolchain for the `js/wasm` target expect their
//! embedder to provide a small import module: process control, clocks,
//! timeout scheduling, entropy, and a dynamically typed value API through
//! which the guest reaches host objects. This crate supplies that module
//! on top of wasmtime.
//!
//! [`Runner`] is the entry point: it instantiates a module, lays out
//! argv/environment, makes the initial entry call and drives the guest's
//! sleep/wake event loop. Host objects the guest should see (`fs`,
//! `process`, ...) are passed in through [`RunnerOptions::globals`];
//! ready-made ones live in `wago-shims`.

pub mod abi;
pub mod error;
pub mod exec;
pub mod mem;
pub mod pending;
pub mod refs;
pub mod state;
pub mod timeout;

pub use error::BridgeError;
pub use exec::{Outcome, Runner, RunnerOptions};
pub use pending::make_bridge_object;
pub use state::Bridge;
