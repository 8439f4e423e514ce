//! Handlers for the guest's dynamic value imports (`syscall/js.*`).
//!
//! Layout of each handler follows its calling convention exactly: operand
//! offsets are fixed, call-shaped operations report failures through a
//! trailing `(value, success)` pair, and any handler that may have
//! re-entered the guest re-reads the stack pointer before storing results.

use wasmtime::Caller;

use wago_value::builtins::instance_of;
use wago_value::object::{
    delete_property, get_index, get_property, length_of, set_index, set_property,
};
use wago_value::{call_value, construct_value, CallError, FaultError, HostValue};

use crate::abi::{
    call_outcome, current_sp, demote_contract, load_slot, load_slot_args, mem_and_state,
    store_slot, GuestScope,
};
use crate::state::Bridge;

/// `syscall/js.finalizeRef` — the guest dropped its last handle to an id.
pub(crate) fn finalize_ref(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let id = mem.get_u32(sp + 8)?;
    bridge.refs.release(id);
    Ok(())
}

/// `syscall/js.stringVal` — intern a guest string as a host value.
pub(crate) fn string_val(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let s = mem.load_string(sp + 8)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 24, &HostValue::string(s))?;
    Ok(())
}

/// `syscall/js.valueGet` — named property read.
pub(crate) fn value_get(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (v, name) = {
        let (mem, bridge) = mem_and_state(&mut caller)?;
        let v = load_slot(&mem, &bridge.refs, sp + 8)?;
        let name = mem.load_string(sp + 16)?;
        (v, name)
    };
    let result = get_property(&v, &name)?;
    let sp = current_sp(&mut caller)?;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 32, &result)?;
    Ok(())
}

/// `syscall/js.valueSet` — named property write.
pub(crate) fn value_set(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let name = mem.load_string(sp + 16)?;
    let x = load_slot(&mem, &bridge.refs, sp + 32)?;
    set_property(&v, &name, x)?;
    Ok(())
}

/// `syscall/js.valueDelete` — named property removal.
pub(crate) fn value_delete(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let name = mem.load_string(sp + 16)?;
    delete_property(&v, &name)?;
    Ok(())
}

/// `syscall/js.valueIndex` — integer-indexed read.
pub(crate) fn value_index(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let index = mem.get_i64(sp + 16)?;
    let result = get_index(&v, index)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 24, &result)?;
    Ok(())
}

/// `syscall/js.valueSetIndex` — integer-indexed write.
pub(crate) fn value_set_index(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let index = mem.get_i64(sp + 16)?;
    let x = load_slot(&mem, &bridge.refs, sp + 24)?;
    set_index(&v, index, x)?;
    Ok(())
}

/// `syscall/js.valueCall` — method call: resolve a named member of `v` and
/// invoke it with `v` as receiver.
pub(crate) fn value_call(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (v, name, args) = {
        let (mem, bridge) = mem_and_state(&mut caller)?;
        let v = load_slot(&mem, &bridge.refs, sp + 8)?;
        let name = mem.load_string(sp + 16)?;
        let args = load_slot_args(&mem, &bridge.refs, sp + 32)?;
        (v, name, args)
    };
    // Resolution failures are guest-visible here, unlike in valueGet.
    let result = get_property(&v, &name)
        .map_err(CallError::from)
        .and_then(|callee| {
            let mut scope = GuestScope {
                caller: &mut caller,
            };
            call_value(&mut scope, &callee, v.clone(), &args)
        });
    let (value, ok) = call_outcome(result.map_err(demote_contract))?;
    let sp = current_sp(&mut caller)?;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 56, &value)?;
    mem.set_u8(sp + 64, ok as u8)?;
    Ok(())
}

/// `syscall/js.valueInvoke` — plain function call, absent receiver.
pub(crate) fn value_invoke(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (v, args) = {
        let (mem, bridge) = mem_and_state(&mut caller)?;
        let v = load_slot(&mem, &bridge.refs, sp + 8)?;
        let args = load_slot_args(&mem, &bridge.refs, sp + 16)?;
        (v, args)
    };
    let result = {
        let mut scope = GuestScope {
            caller: &mut caller,
        };
        call_value(&mut scope, &v, HostValue::Undefined, &args)
    };
    let (value, ok) = call_outcome(result.map_err(demote_contract))?;
    let sp = current_sp(&mut caller)?;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 40, &value)?;
    mem.set_u8(sp + 48, ok as u8)?;
    Ok(())
}

/// `syscall/js.valueNew` — constructor call.
pub(crate) fn value_new(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (v, args) = {
        let (mem, bridge) = mem_and_state(&mut caller)?;
        let v = load_slot(&mem, &bridge.refs, sp + 8)?;
        let args = load_slot_args(&mem, &bridge.refs, sp + 16)?;
        (v, args)
    };
    let result = {
        let mut scope = GuestScope {
            caller: &mut caller,
        };
        construct_value(&mut scope, &v, &args)
    };
    let (value, ok) = call_outcome(result.map_err(demote_contract))?;
    let sp = current_sp(&mut caller)?;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    store_slot(&mut mem, &mut bridge.refs, sp + 40, &value)?;
    mem.set_u8(sp + 48, ok as u8)?;
    Ok(())
}

/// `syscall/js.valueLength` — element count of an indexable value.
pub(crate) fn value_length(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let len = length_of(&v)?;
    mem.set_i64(sp + 16, len as i64)?;
    Ok(())
}

/// `syscall/js.valuePrepareString` — stringify a value and stage its UTF-8
/// bytes for a follow-up `valueLoadString`.
pub(crate) fn value_prepare_string(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let encoded = v.to_display_string().into_bytes();
    let len = encoded.len() as i64;
    store_slot(&mut mem, &mut bridge.refs, sp + 16, &HostValue::bytes(encoded))?;
    mem.set_i64(sp + 24, len)?;
    Ok(())
}

/// `syscall/js.valueLoadString` — copy staged string bytes into the
/// guest's buffer.
pub(crate) fn value_load_string(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let data = match &v {
        HostValue::Bytes(b) => b.borrow().clone(),
        HostValue::String(s) => s.as_bytes().to_vec(),
        other => {
            return Err(
                FaultError::contract(format!("load string from {}", other.type_name())).into(),
            )
        }
    };
    let dst = mem.load_slice(sp + 16)?;
    let n = dst.len().min(data.len());
    dst[..n].copy_from_slice(&data[..n]);
    Ok(())
}

/// `syscall/js.valueInstanceOf` — prototype-brand test.
pub(crate) fn value_instance_of(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let v = load_slot(&mem, &bridge.refs, sp + 8)?;
    let ctor = load_slot(&mem, &bridge.refs, sp + 16)?;
    let matches = instance_of(&v, &ctor)?;
    mem.set_u8(sp + 24, matches as u8)?;
    Ok(())
}

/// `syscall/js.copyBytesToGo` — copy from a host byte buffer into guest
/// memory. A non-buffer source reports failure instead of trapping.
pub(crate) fn copy_bytes_to_go(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let src = load_slot(&mem, &bridge.refs, sp + 32)?;
    let HostValue::Bytes(src) = src else {
        mem.set_u8(sp + 48, 0)?;
        return Ok(());
    };
    let src = src.borrow();
    let dst = mem.load_slice(sp + 8)?;
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    mem.set_i64(sp + 40, n as i64)?;
    mem.set_u8(sp + 48, 1)?;
    Ok(())
}

/// `syscall/js.copyBytesToJS` — copy from guest memory into a host byte
/// buffer. A non-buffer destination reports failure instead of trapping.
pub(crate) fn copy_bytes_to_js(mut caller: Caller<'_, Bridge>, sp: i32) -> wasmtime::Result<()> {
    let sp = sp as u32 as u64;
    let (mut mem, bridge) = mem_and_state(&mut caller)?;
    let dst = load_slot(&mem, &bridge.refs, sp + 8)?;
    let HostValue::Bytes(dst) = dst else {
        mem.set_u8(sp + 48, 0)?;
        return Ok(());
    };
    let mut dst = dst.borrow_mut();
    let src = mem.load_slice(sp + 16)?;
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    mem.set_i64(sp + 40, n as i64)?;
    mem.set_u8(sp + 48, 1)?;
    Ok(())
}
