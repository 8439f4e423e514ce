//! Host ABI dispatch for the guest runtime's import module.
//!
//! Every import shares one calling convention: a single i32 stack pointer
//! argument, with operands and results at fixed offsets from it. Handlers
//! decode operands through [`Mem`](crate::mem::Mem) and the reference
//! table, run the operation, and write results back.
//!
//! Handlers that can re-enter the guest (property getters never do here,
//! but calls and constructors can) must re-read the stack pointer through
//! the guest's `getsp` export before writing results, because re-entry may
//! grow and move the guest stack.

pub mod js;
pub mod runtime;

use wasmtime::{AsContextMut, Caller, Linker};

use wago_value::{CallError, CallScope, FaultError, HostValue};

use crate::error::BridgeError;
use crate::mem::Mem;
use crate::refs::{RefTable, Slot};
use crate::state::Bridge;

/// Import module name the guest toolchain links against.
pub const IMPORT_MODULE: &str = "go";

/// Register every host import on `linker` under [`IMPORT_MODULE`].
pub fn add_to_linker(linker: &mut Linker<Bridge>) -> Result<(), BridgeError> {
    let m = IMPORT_MODULE;
    linker.func_wrap(m, "runtime.wasmExit", runtime::wasm_exit)?;
    linker.func_wrap(m, "runtime.wasmWrite", runtime::wasm_write)?;
    linker.func_wrap(m, "runtime.resetMemoryDataView", runtime::reset_memory_data_view)?;
    linker.func_wrap(m, "runtime.nanotime1", runtime::nanotime1)?;
    linker.func_wrap(m, "runtime.walltime", runtime::walltime)?;
    // Pre-1.17 toolchains import the wall clock under this name; the
    // layout is identical.
    linker.func_wrap(m, "runtime.walltime1", runtime::walltime)?;
    linker.func_wrap(m, "runtime.scheduleTimeoutEvent", runtime::schedule_timeout_event)?;
    linker.func_wrap(m, "runtime.clearTimeoutEvent", runtime::clear_timeout_event)?;
    linker.func_wrap(m, "runtime.getRandomData", runtime::get_random_data)?;
    linker.func_wrap(m, "debug", runtime::debug)?;

    linker.func_wrap(m, "syscall/js.finalizeRef", js::finalize_ref)?;
    linker.func_wrap(m, "syscall/js.stringVal", js::string_val)?;
    linker.func_wrap(m, "syscall/js.valueGet", js::value_get)?;
    linker.func_wrap(m, "syscall/js.valueSet", js::value_set)?;
    linker.func_wrap(m, "syscall/js.valueDelete", js::value_delete)?;
    linker.func_wrap(m, "syscall/js.valueIndex", js::value_index)?;
    linker.func_wrap(m, "syscall/js.valueSetIndex", js::value_set_index)?;
    linker.func_wrap(m, "syscall/js.valueCall", js::value_call)?;
    linker.func_wrap(m, "syscall/js.valueInvoke", js::value_invoke)?;
    linker.func_wrap(m, "syscall/js.valueNew", js::value_new)?;
    linker.func_wrap(m, "syscall/js.valueLength", js::value_length)?;
    linker.func_wrap(m, "syscall/js.valuePrepareString", js::value_prepare_string)?;
    linker.func_wrap(m, "syscall/js.valueLoadString", js::value_load_string)?;
    linker.func_wrap(m, "syscall/js.valueInstanceOf", js::value_instance_of)?;
    linker.func_wrap(m, "syscall/js.copyBytesToGo", js::copy_bytes_to_go)?;
    linker.func_wrap(m, "syscall/js.copyBytesToJS", js::copy_bytes_to_js)?;
    Ok(())
}

// ======================================================================
// Shared handler plumbing
// ======================================================================

/// Disjoint views of guest memory and bridge state, valid for the current
/// handler invocation only.
pub(crate) fn mem_and_state<'a>(
    caller: &'a mut Caller<'_, Bridge>,
) -> Result<(Mem<'a>, &'a mut Bridge), BridgeError> {
    let memory = caller.data().memory()?;
    let (data, bridge) = memory.data_and_store_mut(caller);
    Ok((Mem::new(data), bridge))
}

/// Re-enter the guest's resumption entry point.
pub(crate) fn resume_guest(mut ctx: impl AsContextMut<Data = Bridge>) -> Result<(), FaultError> {
    if ctx.as_context().data().has_exited() {
        return Err(FaultError::Exited);
    }
    let resume = ctx
        .as_context()
        .data()
        .resume_fn
        .clone()
        .ok_or_else(|| FaultError::contract("resume export not bound"))?;
    resume
        .call(&mut ctx, ())
        .map_err(|err| FaultError::Guest(format!("{err:#}")))
}

/// Ask the guest for its current stack pointer.
pub(crate) fn current_sp(mut ctx: impl AsContextMut<Data = Bridge>) -> Result<u64, BridgeError> {
    let getsp = ctx
        .as_context()
        .data()
        .getsp_fn
        .clone()
        .ok_or(BridgeError::MissingExport("getsp"))?;
    let sp = getsp.call(&mut ctx, ())?;
    Ok(sp as u32 as u64)
}

/// [`CallScope`] backed by the live handler invocation. Host functions
/// called from inside a handler resume the guest through this.
pub(crate) struct GuestScope<'a, 'b> {
    pub caller: &'a mut Caller<'b, Bridge>,
}

impl CallScope for GuestScope<'_, '_> {
    fn resume(&mut self) -> Result<(), FaultError> {
        resume_guest(&mut *self.caller)
    }
}

// ======================================================================
// Slot marshalling
// ======================================================================

pub(crate) fn load_slot(mem: &Mem<'_>, refs: &RefTable, addr: u64) -> Result<HostValue, BridgeError> {
    refs.load(Slot::from_bits(mem.get_u64(addr)?))
}

pub(crate) fn store_slot(
    mem: &mut Mem<'_>,
    refs: &mut RefTable,
    addr: u64,
    value: &HostValue,
) -> Result<(), BridgeError> {
    mem.set_u64(addr, refs.store(value).to_bits())
}

/// Decode a guest slice of 8-byte value slots (the argument vector of
/// `valueCall`/`valueInvoke`/`valueNew`).
pub(crate) fn load_slot_args(
    mem: &Mem<'_>,
    refs: &RefTable,
    addr: u64,
) -> Result<Vec<HostValue>, BridgeError> {
    let (ptr, len) = mem.slice_header(addr)?;
    let mut args = Vec::with_capacity(len as usize);
    for i in 0..len {
        args.push(load_slot(mem, refs, ptr + i * 8)?);
    }
    Ok(args)
}

/// Downgrade contract faults raised while resolving a callee into thrown
/// host errors. Call-shaped operations report resolution failures to the
/// guest through the `(value, success=0)` channel; only exit and guest
/// traps stay fatal there.
pub(crate) fn demote_contract(err: CallError) -> CallError {
    match err {
        CallError::Fatal(FaultError::Contract(msg)) => {
            CallError::Thrown(wago_value::builtins::error_value(msg))
        }
        other => other,
    }
}

/// Split a call outcome into the guest-visible `(value, success)` pair, or
/// propagate a fatal fault.
pub(crate) fn call_outcome(
    result: Result<HostValue, CallError>,
) -> Result<(HostValue, bool), BridgeError> {
    match result {
        Ok(value) => Ok((value, true)),
        Err(CallError::Thrown(value)) => Ok((value, false)),
        Err(CallError::Fatal(fault)) => Err(fault.into()),
    }
}
