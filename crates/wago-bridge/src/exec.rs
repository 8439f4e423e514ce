//! Instance lifecycle: instantiation, argument layout, the start call and
//! the timeout-driven event loop.

use std::collections::BTreeMap;
use std::time::Instant;

use wasmtime::{Engine, Linker, Module, Store, TypedFunc};

use wago_value::builtins::global_builtins;
use wago_value::{CallResult, CallScope, FaultError, HostObject, HostValue};

use crate::abi::{self, resume_guest};
use crate::error::BridgeError;
use crate::mem::Mem;
use crate::pending::make_bridge_object;
use crate::state::Bridge;

/// Start of the argv/env string area in guest memory.
const ARGS_BASE: u64 = 4096;
/// First address the guest's own data may occupy; the argument block must
/// stay below it.
const DATA_BASE: u64 = 12288;

/// How instantiation and the first entry call are parameterized.
pub struct RunnerOptions {
    /// Guest `os.Args`. The first element is the program name.
    pub argv: Vec<String>,
    /// Guest environment. Ordered, so the guest sees a stable layout.
    pub env: BTreeMap<String, String>,
    /// Extra properties for the global object, on top of the builtin
    /// constructors. This is where collaborator objects (`fs`, `process`,
    /// ...) are attached.
    pub globals: Vec<(String, HostValue)>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            argv: vec!["js".to_string()],
            env: BTreeMap::new(),
            globals: Vec::new(),
        }
    }
}

/// What a completed entry call left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The guest called its exit path with this code.
    Exited(i32),
    /// The guest returned with no exit and no pending wake-ups; it is
    /// parked waiting for host calls into its wrapped functions.
    Idle,
}

/// One guest instance with its bridge state and entry points.
pub struct Runner {
    store: Store<Bridge>,
    run_fn: TypedFunc<(i32, i32), ()>,
    argv: Vec<String>,
    env: BTreeMap<String, String>,
    started: bool,
}

impl Runner {
    /// Compile `wasm` and instantiate it against the host ABI.
    pub fn new(wasm: &[u8], options: RunnerOptions) -> Result<Self, BridgeError> {
        let engine = Engine::default();
        let module = Module::new(&engine, wasm)?;

        let mut props = global_builtins();
        props.extend(options.globals);
        let globals = HostValue::object(HostObject::with_props(props));
        let bridge_obj = make_bridge_object();

        let mut store = Store::new(&engine, Bridge::new(globals, bridge_obj));
        let mut linker = Linker::new(&engine);
        abi::add_to_linker(&mut linker)?;
        // Imports outside the ABI surface (toolchain experiments, wasi
        // probes) trap if reached rather than failing instantiation.
        linker.define_unknown_imports_as_traps(&module)?;
        let instance = linker.instantiate(&mut store, &module)?;

        let memory = instance
            .get_memory(&mut store, "mem")
            .ok_or(BridgeError::MissingExport("mem"))?;
        let run_fn = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, "run")
            .map_err(|_| BridgeError::MissingExport("run"))?;
        let resume_fn = instance
            .get_typed_func::<(), ()>(&mut store, "resume")
            .map_err(|_| BridgeError::MissingExport("resume"))?;
        let getsp_fn = instance
            .get_typed_func::<(), i32>(&mut store, "getsp")
            .map_err(|_| BridgeError::MissingExport("getsp"))?;

        let bridge = store.data_mut();
        bridge.memory = Some(memory);
        bridge.resume_fn = Some(resume_fn);
        bridge.getsp_fn = Some(getsp_fn);

        Ok(Self {
            store,
            run_fn,
            argv: options.argv,
            env: options.env,
            started: false,
        })
    }

    /// Lay out arguments and make the initial entry call. Returns once the
    /// guest yields: either it exited, or it parked waiting for events.
    pub fn start(&mut self) -> Result<Outcome, BridgeError> {
        if self.started {
            return Err(FaultError::contract("guest already started").into());
        }
        self.started = true;
        let (argc, argv) = self.write_args()?;
        log::debug!("entering guest, argc {argc}");
        self.run_fn.call(&mut self.store, (argc, argv))?;
        Ok(self.current_outcome())
    }

    /// Drive scheduled wake-ups until the guest exits or runs out of them.
    pub fn run_until_exit(&mut self) -> Result<Outcome, BridgeError> {
        loop {
            if let Outcome::Exited(code) = self.current_outcome() {
                return Ok(Outcome::Exited(code));
            }
            let Some((id, deadline)) = self.store.data_mut().timeouts.pop_next() else {
                return Ok(Outcome::Idle);
            };
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.resume()?;
            // The guest acknowledges a delivered wake-up by cancelling its
            // id. Its scheduler can go back to sleep without doing so;
            // nudge it again until the id is retired.
            while self.store.data().timeouts.is_scheduled(id) {
                log::warn!("scheduleTimeoutEvent: missed timeout event");
                self.resume()?;
            }
        }
    }

    /// Run the guest to completion: the entry call plus the event loop.
    pub fn run(&mut self) -> Result<Outcome, BridgeError> {
        match self.start()? {
            Outcome::Exited(code) => Ok(Outcome::Exited(code)),
            Outcome::Idle => self.run_until_exit(),
        }
    }

    /// Re-enter a parked guest once.
    pub fn resume(&mut self) -> Result<(), BridgeError> {
        Ok(resume_guest(&mut self.store)?)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.store.data().exit_code
    }

    fn current_outcome(&self) -> Outcome {
        match self.store.data().exit_code {
            Some(code) => Outcome::Exited(code),
            None => Outcome::Idle,
        }
    }

    /// The global object the guest resolves names against.
    pub fn globals(&self) -> HostValue {
        self.store.data().globals.clone()
    }

    /// The bridge object carrying guest function wrappers.
    pub fn bridge_object(&self) -> HostValue {
        self.store.data().bridge_obj.clone()
    }

    /// Call a host value (typically a guest function wrapper) with this
    /// instance as the re-entry scope.
    pub fn call_function(&mut self, f: &HostValue, this: HostValue, args: &[HostValue]) -> CallResult {
        let mut scope = RootScope {
            store: &mut self.store,
        };
        wago_value::call_value(&mut scope, f, this, args)
    }

    fn write_args(&mut self) -> Result<(i32, i32), BridgeError> {
        let memory = self.store.data().memory()?;
        let (data, _) = memory.data_and_store_mut(&mut self.store);
        let mut mem = Mem::new(data);
        write_args_into(&mut mem, &self.argv, &self.env)
    }
}

/// Top-level [`CallScope`]: re-entry goes straight through the store.
struct RootScope<'a> {
    store: &'a mut Store<Bridge>,
}

impl CallScope for RootScope<'_> {
    fn resume(&mut self) -> Result<(), FaultError> {
        resume_guest(&mut *self.store)
    }
}

/// Write argv and environment into guest memory in the layout the guest
/// startup code expects: NUL-terminated strings 8-byte aligned from
/// [`ARGS_BASE`], then the pointer vector (argv pointers, zero, env
/// `KEY=VALUE` pointers, zero) as 64-bit little-endian entries.
fn write_args_into(
    mem: &mut Mem<'_>,
    argv: &[String],
    env: &BTreeMap<String, String>,
) -> Result<(i32, i32), BridgeError> {
    fn write_str(mem: &mut Mem<'_>, offset: &mut u64, s: &str) -> Result<u64, BridgeError> {
        let ptr = *offset;
        mem.write_bytes(ptr, s.as_bytes())?;
        mem.set_u8(ptr + s.len() as u64, 0)?;
        *offset += s.len() as u64 + 1;
        if *offset % 8 != 0 {
            *offset += 8 - *offset % 8;
        }
        Ok(ptr)
    }

    let mut offset = ARGS_BASE;
    let mut ptrs = Vec::with_capacity(argv.len() + env.len() + 2);
    for arg in argv {
        ptrs.push(write_str(mem, &mut offset, arg)?);
    }
    ptrs.push(0);
    for (key, value) in env {
        ptrs.push(write_str(mem, &mut offset, &format!("{key}={value}"))?);
    }
    ptrs.push(0);

    let argv_ptr = offset;
    for ptr in &ptrs {
        mem.set_u64(offset, *ptr)?;
        offset += 8;
    }
    if offset >= DATA_BASE {
        return Err(
            FaultError::contract("command line and environment do not fit the argument area")
                .into(),
        );
    }
    Ok((argv.len() as i32, argv_ptr as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_block_layout() {
        let mut buf = vec![0u8; 16 * 1024];
        let mut mem = Mem::new(&mut buf);
        let argv = vec!["js".to_string(), "-v".to_string()];
        let mut env = BTreeMap::new();
        env.insert("B".to_string(), "2".to_string());
        env.insert("A".to_string(), "1".to_string());

        let (argc, argv_ptr) = write_args_into(&mut mem, &argv, &env).unwrap();
        assert_eq!(argc, 2);
        let argv_ptr = argv_ptr as u64;

        // Strings start at the base, NUL-terminated, 8-byte aligned.
        assert_eq!(mem.slice(4096, 3).unwrap(), b"js\0");
        assert_eq!(mem.slice(4104, 3).unwrap(), b"-v\0");

        let arg0 = mem.get_u64(argv_ptr).unwrap();
        let arg1 = mem.get_u64(argv_ptr + 8).unwrap();
        assert_eq!(arg0, 4096);
        assert_eq!(arg1, 4104);
        assert_eq!(mem.get_u64(argv_ptr + 16).unwrap(), 0);

        // Environment entries follow, sorted by key, then the terminator.
        let env0 = mem.get_u64(argv_ptr + 24).unwrap();
        let env1 = mem.get_u64(argv_ptr + 32).unwrap();
        assert_eq!(mem.slice(env0, 4).unwrap(), b"A=1\0");
        assert_eq!(mem.slice(env1, 4).unwrap(), b"B=2\0");
        assert_eq!(mem.get_u64(argv_ptr + 40).unwrap(), 0);
    }

    #[test]
    fn oversized_arguments_are_rejected() {
        let mut buf = vec![0u8; 16 * 1024];
        let mut mem = Mem::new(&mut buf);
        let argv = vec!["x".repeat(9000)];
        let err = write_args_into(&mut mem, &argv, &BTreeMap::new());
        assert!(err.is_err());
    }
}
