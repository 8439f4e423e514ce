//! Object model and dynamic property operations.
//!
//! Property and index access is implemented as a closed set of capability
//! checks over [`HostValue`]: each operation states the receiver shape it
//! requires and fails with a contract fault otherwise (the guest runtime
//! never retries these — a wrong receiver means the protocol is broken).

use rustc_hash::FxHashMap;

use crate::error::FaultError;
use crate::value::HostValue;

/// Property-bearing object instance.
#[derive(Debug, Default)]
pub struct HostObject {
    /// Named properties.
    pub props: FxHashMap<String, HostValue>,
    /// Identity of the constructor that produced this object, if any.
    pub ctor_identity: Option<usize>,
    /// Error brand, set for host error values (`instanceof Error`).
    pub is_error: bool,
}

impl HostObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an object from a property list.
    pub fn with_props<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        let mut obj = Self::new();
        for (k, v) in props {
            obj.props.insert(k.into(), v);
        }
        obj
    }
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// `valueGet` semantics: named property lookup.
///
/// Arrays, byte buffers and functions answer their conventional synthetic
/// properties; anything that is not object-like is a contract fault.
pub fn get_property(value: &HostValue, name: &str) -> Result<HostValue, FaultError> {
    match value {
        HostValue::Object(obj) => Ok(obj
            .borrow()
            .props
            .get(name)
            .cloned()
            .unwrap_or(HostValue::Undefined)),
        HostValue::Array(items) => match name {
            "length" => Ok(HostValue::Number(items.borrow().len() as f64)),
            _ => Ok(HostValue::Undefined),
        },
        HostValue::Bytes(data) => match name {
            "length" | "byteLength" => Ok(HostValue::Number(data.borrow().len() as f64)),
            _ => Ok(HostValue::Undefined),
        },
        HostValue::Function(f) => match name {
            "name" => Ok(HostValue::string(f.name())),
            _ => Ok(HostValue::Undefined),
        },
        HostValue::String(s) => match name {
            "length" => Ok(HostValue::Number(utf16_len(s) as f64)),
            _ => Ok(HostValue::Undefined),
        },
        other => Err(FaultError::contract(format!(
            "property get \"{name}\" on {}",
            other.type_name()
        ))),
    }
}

/// `valueSet` semantics: named property write. Only plain objects accept
/// property mutation.
pub fn set_property(value: &HostValue, name: &str, x: HostValue) -> Result<(), FaultError> {
    match value {
        HostValue::Object(obj) => {
            obj.borrow_mut().props.insert(name.to_string(), x);
            Ok(())
        }
        other => Err(FaultError::contract(format!(
            "property set \"{name}\" on {}",
            other.type_name()
        ))),
    }
}

/// `valueDelete` semantics. Deleting an absent property is a no-op.
pub fn delete_property(value: &HostValue, name: &str) -> Result<(), FaultError> {
    match value {
        HostValue::Object(obj) => {
            obj.borrow_mut().props.remove(name);
            Ok(())
        }
        other => Err(FaultError::contract(format!(
            "property delete \"{name}\" on {}",
            other.type_name()
        ))),
    }
}

/// `valueIndex` semantics: integer-indexed read.
pub fn get_index(value: &HostValue, index: i64) -> Result<HostValue, FaultError> {
    if index < 0 {
        return Ok(HostValue::Undefined);
    }
    let index = index as usize;
    match value {
        HostValue::Array(items) => Ok(items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(HostValue::Undefined)),
        HostValue::Bytes(data) => Ok(data
            .borrow()
            .get(index)
            .map(|b| HostValue::Number(*b as f64))
            .unwrap_or(HostValue::Undefined)),
        other => Err(FaultError::contract(format!(
            "indexed get on {}",
            other.type_name()
        ))),
    }
}

/// `valueSetIndex` semantics: integer-indexed write. Arrays grow with
/// absent elements when written past their end.
pub fn set_index(value: &HostValue, index: i64, x: HostValue) -> Result<(), FaultError> {
    if index < 0 {
        return Err(FaultError::contract("indexed set with negative index"));
    }
    let index = index as usize;
    match value {
        HostValue::Array(items) => {
            let mut items = items.borrow_mut();
            if index >= items.len() {
                items.resize(index + 1, HostValue::Undefined);
            }
            items[index] = x;
            Ok(())
        }
        HostValue::Bytes(data) => {
            let mut data = data.borrow_mut();
            if index >= data.len() {
                return Err(FaultError::contract("indexed set past byte buffer end"));
            }
            let byte = x.as_f64().ok_or_else(|| {
                FaultError::contract(format!("byte buffer element from {}", x.type_name()))
            })?;
            data[index] = byte as i64 as u8;
            Ok(())
        }
        other => Err(FaultError::contract(format!(
            "indexed set on {}",
            other.type_name()
        ))),
    }
}

/// `valueLength` semantics: element count of an indexable receiver.
pub fn length_of(value: &HostValue) -> Result<u64, FaultError> {
    match value {
        HostValue::Array(items) => Ok(items.borrow().len() as u64),
        HostValue::Bytes(data) => Ok(data.borrow().len() as u64),
        HostValue::String(s) => Ok(utf16_len(s) as u64),
        other => Err(FaultError::contract(format!(
            "length of {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_property_round_trip() {
        let obj = HostValue::empty_object();
        assert!(get_property(&obj, "x").unwrap().is_undefined());

        set_property(&obj, "x", HostValue::Number(7.0)).unwrap();
        assert_eq!(get_property(&obj, "x").unwrap().as_f64(), Some(7.0));

        delete_property(&obj, "x").unwrap();
        assert!(get_property(&obj, "x").unwrap().is_undefined());
    }

    #[test]
    fn property_get_requires_object_like() {
        assert!(get_property(&HostValue::Number(1.0), "x").is_err());
        assert!(get_property(&HostValue::Null, "x").is_err());
    }

    #[test]
    fn synthetic_lengths() {
        let arr = HostValue::array(vec![HostValue::Null, HostValue::Number(2.0)]);
        assert_eq!(get_property(&arr, "length").unwrap().as_f64(), Some(2.0));

        let bytes = HostValue::bytes(vec![0; 5]);
        assert_eq!(get_property(&bytes, "byteLength").unwrap().as_f64(), Some(5.0));
        assert_eq!(length_of(&bytes).unwrap(), 5);

        // Multi-byte characters count in UTF-16 units, not bytes.
        assert_eq!(length_of(&HostValue::string("héllo")).unwrap(), 5);
    }

    #[test]
    fn indexed_access() {
        let arr = HostValue::array(vec![HostValue::Number(1.0)]);
        assert_eq!(get_index(&arr, 0).unwrap().as_f64(), Some(1.0));
        assert!(get_index(&arr, 5).unwrap().is_undefined());

        set_index(&arr, 3, HostValue::Number(4.0)).unwrap();
        assert_eq!(length_of(&arr).unwrap(), 4);
        assert!(get_index(&arr, 1).unwrap().is_undefined());

        let bytes = HostValue::bytes(vec![0, 0]);
        set_index(&bytes, 1, HostValue::Number(255.0)).unwrap();
        assert_eq!(get_index(&bytes, 1).unwrap().as_f64(), Some(255.0));
        assert!(set_index(&bytes, 9, HostValue::Number(1.0)).is_err());
    }
}
