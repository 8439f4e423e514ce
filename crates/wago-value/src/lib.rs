//! Host-native dynamic value model for the wago bridge.
//!
//! The Go runtime compiled to WebAssembly manipulates "host values" —
//! dynamically typed references it only ever sees through small integer
//! ids. This crate defines that value universe ([`HostValue`]), the object
//! and function model behind it, and the [`CallScope`] trait through which
//! host functions re-enter suspended guest code.
//!
//! The bridge itself (reference table, memory marshalling, ABI dispatch)
//! lives in `wago-bridge`; collaborator objects (`fs`, `process`, ...) in
//! `wago-shims`. Both program against this crate only.

pub mod builtins;
pub mod error;
pub mod object;
pub mod scope;
pub mod value;

pub use error::FaultError;
pub use object::HostObject;
pub use scope::{call_value, construct_value, CallError, CallResult, CallScope};
pub use value::{HostFunction, HostValue};
