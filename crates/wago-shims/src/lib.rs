//! Ready-made collaborator objects for the wago bridge.
//!
//! Guests compiled by the Go toolchain expect the embedder's global object
//! to carry a handful of host collaborators: `fs`, `process`, `crypto` and
//! `performance`. This crate provides host-backed implementations of each,
//! shaped the way the guest's syscall layer probes for them. Capabilities
//! the host does not provide answer with `ENOSYS`-coded errors, which the
//! guest maps onto its own "not implemented" errno.

pub mod crypto;
pub mod enosys;
pub mod fs;
pub mod performance;
pub mod process;

use wago_value::HostValue;

/// The full default collaborator set, ready for
/// `RunnerOptions::globals`.
pub fn default_globals() -> Vec<(String, HostValue)> {
    vec![
        ("fs".to_string(), fs::make_fs()),
        ("process".to_string(), process::make_process()),
        ("crypto".to_string(), crypto::make_crypto()),
        ("performance".to_string(), performance::make_performance()),
    ]
}
