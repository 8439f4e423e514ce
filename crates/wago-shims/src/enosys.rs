//! The "not implemented" error and stubs built from it.

use wago_value::builtins::coded_error;
use wago_value::{CallError, HostValue};

/// The conventional error value for syscalls this host does not provide.
/// The guest runtime inspects the `code` property and maps it back to its
/// own `ENOSYS` errno.
pub fn enosys() -> HostValue {
    coded_error("not implemented", "ENOSYS")
}

/// A function that throws [`enosys`] when called directly.
pub fn throwing_stub(name: &str) -> HostValue {
    HostValue::function(name, |_, _, _| Err(CallError::Thrown(enosys())))
}

/// A callback-style function that reports [`enosys`] through its trailing
/// callback argument, as the file system API does.
pub fn callback_stub(name: &str) -> HostValue {
    HostValue::function(name, |scope, _, args| {
        let cb = match args.last() {
            Some(cb) if cb.is_callable() => cb.clone(),
            _ => return Err(CallError::Thrown(enosys())),
        };
        wago_value::call_value(scope, &cb, HostValue::Undefined, &[enosys()])?;
        Ok(HostValue::Undefined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use wago_value::object::get_property;

    #[test]
    fn enosys_carries_the_code() {
        let err = enosys();
        assert_eq!(get_property(&err, "code").unwrap().as_str(), Some("ENOSYS"));
    }
}
