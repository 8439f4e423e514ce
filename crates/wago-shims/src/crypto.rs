//! Entropy collaborator (`crypto.getRandomValues`).

use rand::rngs::OsRng;
use rand::RngCore;

use wago_value::builtins::type_error;
use wago_value::{CallError, HostObject, HostValue};

/// Build the `crypto` collaborator object.
pub fn make_crypto() -> HostValue {
    let get_random_values = HostValue::function("getRandomValues", |_, _, args| {
        match args.first() {
            Some(HostValue::Bytes(buf)) => {
                OsRng.fill_bytes(&mut buf.borrow_mut());
                Ok(HostValue::Bytes(buf.clone()))
            }
            _ => Err(CallError::Thrown(type_error(
                "getRandomValues expects a byte buffer",
            ))),
        }
    });
    HostValue::object(HostObject::with_props([(
        "getRandomValues",
        get_random_values,
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;

    use wago_value::object::get_property;
    use wago_value::{call_value, CallScope, FaultError};

    struct InertScope;

    impl CallScope for InertScope {
        fn resume(&mut self) -> Result<(), FaultError> {
            Ok(())
        }
    }

    #[test]
    fn fills_the_buffer_in_place() {
        let mut scope = InertScope;
        let crypto = make_crypto();
        let f = get_property(&crypto, "getRandomValues").unwrap();
        let buf = HostValue::bytes(vec![0u8; 64]);
        let out = call_value(&mut scope, &f, HostValue::Undefined, &[buf.clone()]).unwrap();
        assert!(out.strict_eq(&buf), "returns the same buffer");
        match buf {
            HostValue::Bytes(b) => assert!(b.borrow().iter().any(|&x| x != 0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn rejects_non_buffer_input() {
        let mut scope = InertScope;
        let crypto = make_crypto();
        let f = get_property(&crypto, "getRandomValues").unwrap();
        assert!(call_value(&mut scope, &f, HostValue::Undefined, &[HostValue::Number(1.0)]).is_err());
    }
}
