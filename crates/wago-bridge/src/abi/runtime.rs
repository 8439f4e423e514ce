//! Handlers for the guest runtime's own imports: process exit, raw
//! output, clocks, timeout scheduling and entropy.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;
use wasmtime::Caller;

use crate::abi::mem_and_state;
use crate::error::BridgeError;
use crate::state::Bridge;

/// `runtime.wasmExit` — the guest requests process termination.
///
/// Termination is recorded, not enacted: the embedder observes the exit
/// code once the current entry call unwinds. Bridge state the guest can no
/// longer legally touch is dropped here.
pub(crate) fn wasm_exit(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let code = mem.get_i32(sp + 8)?;
    log::debug!("guest exit, code {code}");
    bridge.mark_exited(code);
    Ok(())
}

/// `runtime.wasmWrite` — raw byte output to a file descriptor. Only the
/// host's stdout and stderr are forwarded.
pub(crate) fn wasm_write(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, _) = mem_and_state(&mut caller)?;
    let fd = mem.get_i64(sp + 8)?;
    let ptr = mem.get_i64(sp + 16)? as u64;
    let n = mem.get_i32(sp + 24)? as u32 as u64;
    let bytes = mem.slice_mut(ptr, n)?;
    match fd {
        1 => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes).map_err(BridgeError::Io)?;
            out.flush().map_err(BridgeError::Io)?;
        }
        2 => {
            let mut err = std::io::stderr().lock();
            err.write_all(bytes).map_err(BridgeError::Io)?;
            err.flush().map_err(BridgeError::Io)?;
        }
        other => return Err(BridgeError::InvalidFd(other).into()),
    }
    Ok(())
}

/// `runtime.resetMemoryDataView` — the guest grew its memory; rebind the
/// exported memory handle so later handlers see the new backing buffer.
pub(crate) fn reset_memory_data_view(
    mut caller: Caller<'_, Bridge>,
    _sp: i32,
) -> wasmtime::Result<()> {
    let memory = caller
        .get_export("mem")
        .and_then(|e| e.into_memory())
        .ok_or(BridgeError::MissingExport("mem"))?;
    caller.data_mut().memory = Some(memory);
    Ok(())
}

/// `runtime.nanotime1` — monotonic clock, nanoseconds.
pub(crate) fn nanotime1(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let nanos = bridge.monotonic_nanos();
    mem.set_i64(sp + 8, nanos)?;
    Ok(())
}

/// `runtime.walltime` — wall clock as (seconds, nanosecond remainder).
pub(crate) fn walltime(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let (mut mem, _) = mem_and_state(&mut caller)?;
    mem.set_i64(sp + 8, now.as_secs() as i64)?;
    mem.set_i32(sp + 16, now.subsec_nanos() as i32)?;
    Ok(())
}

/// `runtime.scheduleTimeoutEvent` — register a wake-up and return its id.
pub(crate) fn schedule_timeout_event(
    mut caller: Caller<'_, Bridge>,
    sp: i32,
) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let delay_ms = mem.get_i64(sp + 8)?;
    let id = bridge.timeouts.schedule(delay_ms);
    log::trace!("schedule timeout {id} in {delay_ms}ms");
    mem.set_i32(sp + 16, id)?;
    Ok(())
}

/// `runtime.clearTimeoutEvent` — cancel a wake-up registration.
pub(crate) fn clear_timeout_event(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let id = mem.get_i32(sp + 8)?;
    bridge.timeouts.clear(id);
    Ok(())
}

/// `runtime.getRandomData` — fill a guest slice with OS entropy.
pub(crate) fn get_random_data(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, _) = mem_and_state(&mut caller)?;
    OsRng.fill_bytes(mem.load_slice(sp + 8)?);
    Ok(())
}

/// `debug` — the guest runtime's last-resort print.
pub(crate) fn debug(_caller: Caller<'_, Bridge>, value: i32) -> wasmtime::Result<()> {
    log::debug!("guest debug: {value}");
    Ok(())
}
