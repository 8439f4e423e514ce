//! Call scope — how host functions re-enter the guest.
//!
//! Host functions run synchronously inside an ABI handler, but some of
//! them (guest-function wrappers, callback-style collaborators) need to
//! drive the guest's cooperative scheduler before they can return. The
//! [`CallScope`] trait is that single re-entry point; the bridge provides
//! the concrete implementation backed by the live instance. Mirrors the
//! abstract-context split the engine uses for native modules: callees see
//! the trait, never the engine internals.

use crate::error::FaultError;
use crate::value::HostValue;

/// Re-entry handle passed to every host function invocation.
pub trait CallScope {
    /// Re-enter the guest's resumption entry point and run it until the
    /// next voluntary yield. Fatal once the guest has exited.
    fn resume(&mut self) -> Result<(), FaultError>;
}

/// Error channel of a host call.
///
/// `Thrown` values are part of the normal protocol: the dispatcher writes
/// them back to the guest with a `success=0` flag and the guest runtime
/// re-raises them as its own error type. `Fatal` faults propagate out of
/// the dispatcher and terminate the host call stack.
#[derive(Debug)]
pub enum CallError {
    /// A host error value thrown during the call.
    Thrown(HostValue),
    /// An unrecoverable bridge fault.
    Fatal(FaultError),
}

impl From<FaultError> for CallError {
    fn from(fault: FaultError) -> Self {
        CallError::Fatal(fault)
    }
}

/// Result of a host call: a value, or a thrown error / fatal fault.
pub type CallResult = Result<HostValue, CallError>;

/// `valueCall`/`valueInvoke` semantics: invoke `f` with `this` and `args`.
///
/// A non-callable callee is a thrown error (the guest observes it through
/// the `(value, success=0)` pair), never a bridge fault.
pub fn call_value(
    scope: &mut dyn CallScope,
    f: &HostValue,
    this: HostValue,
    args: &[HostValue],
) -> CallResult {
    match f {
        HostValue::Function(func) => func.call(scope, this, args),
        other => Err(CallError::Thrown(crate::builtins::type_error(format!(
            "{} is not a function",
            other.type_name()
        )))),
    }
}

/// `valueNew` semantics: construct with `f` as constructor.
pub fn construct_value(scope: &mut dyn CallScope, f: &HostValue, args: &[HostValue]) -> CallResult {
    match f {
        HostValue::Function(func) => func.construct(scope, args),
        other => Err(CallError::Thrown(crate::builtins::type_error(format!(
            "{} is not a constructor",
            other.type_name()
        )))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scope whose `resume` is a no-op, for unit tests that never re-enter
    /// guest code.
    pub struct InertScope;

    impl CallScope for InertScope {
        fn resume(&mut self) -> Result<(), FaultError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InertScope;
    use super::*;

    #[test]
    fn calling_a_non_function_throws() {
        let mut scope = InertScope;
        let err = call_value(&mut scope, &HostValue::Number(3.0), HostValue::Undefined, &[]);
        match err {
            Err(CallError::Thrown(v)) => assert!(v.to_display_string().contains("not a function")),
            other => panic!("expected thrown error, got {other:?}"),
        }
    }

    #[test]
    fn function_receives_this_and_args() {
        let mut scope = InertScope;
        let f = HostValue::function("sum", |_, this, args| {
            let base = this.as_f64().unwrap_or(0.0);
            let total: f64 = args.iter().filter_map(HostValue::as_f64).sum();
            Ok(HostValue::Number(base + total))
        });
        let out = call_value(
            &mut scope,
            &f,
            HostValue::Number(10.0),
            &[HostValue::Number(1.0), HostValue::Number(2.0)],
        )
        .unwrap();
        assert_eq!(out.as_f64(), Some(13.0));
    }
}
