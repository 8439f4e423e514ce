//! Builtin constructors and error values.
//!
//! The guest runtime expects a handful of well-known constructors to be
//! reachable from the global object (`Uint8Array` above all — the Go
//! runtime allocates byte buffers through it). These are plain
//! [`HostFunction`]s with a construct path and a brand for `instanceof`.

use crate::error::FaultError;
use crate::object::HostObject;
use crate::scope::CallError;
use crate::value::{FnBrand, HostFunction, HostValue};

/// Build a host error value: an error-branded object with a `message`
/// property.
pub fn error_value(message: impl Into<String>) -> HostValue {
    let mut obj = HostObject::with_props([("message", HostValue::string(message.into()))]);
    obj.is_error = true;
    HostValue::object(obj)
}

/// An error value carrying a conventional `code` property (`"ENOSYS"`,
/// `"EBADF"`, ...), the shape callback-style collaborators hand back.
pub fn coded_error(message: impl Into<String>, code: &str) -> HostValue {
    let mut obj = HostObject::with_props([
        ("message", HostValue::string(message.into())),
        ("code", HostValue::string(code)),
    ]);
    obj.is_error = true;
    HostValue::object(obj)
}

/// Type errors thrown by the value layer itself (bad callee, bad
/// constructor argument).
pub fn type_error(message: impl Into<String>) -> HostValue {
    error_value(message)
}

fn ctor_arg_len(args: &[HostValue]) -> Result<usize, CallError> {
    match args.first() {
        None => Ok(0),
        Some(HostValue::Number(n)) if *n >= 0.0 => Ok(*n as usize),
        Some(other) => Err(CallError::Thrown(type_error(format!(
            "invalid length argument of type {}",
            other.type_name()
        )))),
    }
}

/// `new Uint8Array(len)` / `new Uint8Array(array)`.
pub fn uint8_array_ctor() -> HostFunction {
    HostFunction::constructor("Uint8Array", FnBrand::Uint8Array, |_, args| {
        match args.first() {
            Some(HostValue::Array(items)) => {
                let items = items.borrow();
                let mut data = Vec::with_capacity(items.len());
                for item in items.iter() {
                    data.push(item.as_f64().unwrap_or(0.0) as i64 as u8);
                }
                Ok(HostValue::bytes(data))
            }
            Some(HostValue::Bytes(src)) => Ok(HostValue::bytes(src.borrow().clone())),
            _ => Ok(HostValue::bytes(vec![0; ctor_arg_len(args)?])),
        }
    })
}

/// `new Object()`.
pub fn object_ctor() -> HostFunction {
    HostFunction::constructor("Object", FnBrand::Object, |_, _| Ok(HostValue::empty_object()))
}

/// `new Array(len)`.
pub fn array_ctor() -> HostFunction {
    HostFunction::constructor("Array", FnBrand::Array, |_, args| {
        Ok(HostValue::array(vec![HostValue::Undefined; ctor_arg_len(args)?]))
    })
}

/// `new Error(message)`.
pub fn error_ctor() -> HostFunction {
    HostFunction::constructor("Error", FnBrand::Error, |_, args| {
        let message = args
            .first()
            .map(HostValue::to_display_string)
            .unwrap_or_default();
        Ok(error_value(message))
    })
}

/// `valueInstanceOf` semantics: prototype-chain test of `value` against a
/// resolved constructor reference. A non-function right-hand side is a
/// contract fault (the guest runtime never passes one).
pub fn instance_of(value: &HostValue, ctor: &HostValue) -> Result<bool, FaultError> {
    let func = match ctor {
        HostValue::Function(f) => f,
        other => {
            return Err(FaultError::contract(format!(
                "instanceof right-hand side is {}",
                other.type_name()
            )))
        }
    };
    Ok(match func.brand() {
        FnBrand::Uint8Array => value.is_byte_buffer(),
        FnBrand::Array => matches!(value, HostValue::Array(_)),
        FnBrand::Object => value.is_object_like(),
        FnBrand::Error => match value {
            HostValue::Object(obj) => obj.borrow().is_error,
            _ => false,
        },
        FnBrand::None => match value {
            HostValue::Object(obj) => obj.borrow().ctor_identity == Some(func.identity()),
            _ => false,
        },
    })
}

/// Construct the default builtin entries every global object carries.
pub fn global_builtins() -> Vec<(String, HostValue)> {
    [
        ("Uint8Array", uint8_array_ctor()),
        ("Object", object_ctor()),
        ("Array", array_ctor()),
        ("Error", error_ctor()),
    ]
    .into_iter()
    .map(|(name, f)| (name.to_string(), HostValue::Function(f)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::testing::InertScope;

    #[test]
    fn uint8_array_constructs_zeroed_buffers() {
        let mut scope = InertScope;
        let ctor = uint8_array_ctor();
        let buf = ctor.construct(&mut scope, &[HostValue::Number(4.0)]).unwrap();
        match &buf {
            HostValue::Bytes(b) => assert_eq!(&*b.borrow(), &[0, 0, 0, 0]),
            other => panic!("expected bytes, got {}", other.type_name()),
        }
        assert!(instance_of(&buf, &HostValue::Function(ctor)).unwrap());
    }

    #[test]
    fn error_brand_matches_error_ctor() {
        let err = coded_error("not implemented", "ENOSYS");
        let ctor = HostValue::Function(error_ctor());
        assert!(instance_of(&err, &ctor).unwrap());
        assert!(!instance_of(&HostValue::empty_object(), &ctor).unwrap());
        assert_eq!(
            crate::object::get_property(&err, "code").unwrap().as_str(),
            Some("ENOSYS")
        );
    }

    #[test]
    fn instanceof_requires_a_function() {
        assert!(instance_of(&HostValue::Null, &HostValue::Number(1.0)).is_err());
    }
}
