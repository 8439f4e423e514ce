//! `HostValue` — the dynamically typed host value universe.
//!
//! Values are cheap to clone: heap-backed variants share their allocation
//! via `Rc`, so cloning preserves reference identity. Identity (not
//! structural equality) is what the bridge's reference table keys on.
//!
//! The model is deliberately closed: the guest runtime only ever treats a
//! value as an object, a string, a symbol, a function, or a number, so
//! capability checks ([`HostValue::is_object_like`] and friends) replace
//! any open class hierarchy.

use std::cell::RefCell;
use std::rc::Rc;

use crate::object::HostObject;
use crate::scope::{CallError, CallResult, CallScope};

/// Description attached to a symbol value.
#[derive(Debug)]
pub struct SymbolData {
    /// Optional description, as in `Symbol("desc")`.
    pub description: Option<String>,
}

/// Constructor brand for builtin host functions, used by `instanceof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnBrand {
    /// An ordinary function; `instanceof` matches objects it constructed.
    None,
    /// The `Object` constructor; matches every object-like value.
    Object,
    /// The `Array` constructor.
    Array,
    /// The `Uint8Array` constructor; matches byte buffers.
    Uint8Array,
    /// The `Error` constructor; matches error objects.
    Error,
}

type FnBody = Box<dyn Fn(&mut dyn CallScope, HostValue, &[HostValue]) -> CallResult>;
type CtorBody = Box<dyn Fn(&mut dyn CallScope, &[HostValue]) -> CallResult>;

struct FnInner {
    name: String,
    brand: FnBrand,
    body: FnBody,
    construct: Option<CtorBody>,
}

/// A host-callable function value.
///
/// Carries an optional construct path (for `valueNew`) and a brand for
/// prototype-chain tests. Identity is the shared allocation, so clones of
/// the same function map to the same reference id.
#[derive(Clone)]
pub struct HostFunction {
    inner: Rc<FnInner>,
}

impl HostFunction {
    /// Create a plain (non-constructor) function.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut dyn CallScope, HostValue, &[HostValue]) -> CallResult + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(FnInner {
                name: name.into(),
                brand: FnBrand::None,
                body: Box::new(body),
                construct: None,
            }),
        }
    }

    /// Create a branded constructor function.
    pub fn constructor(
        name: impl Into<String>,
        brand: FnBrand,
        construct: impl Fn(&mut dyn CallScope, &[HostValue]) -> CallResult + 'static,
    ) -> Self {
        let name = name.into();
        let thrown = name.clone();
        Self {
            inner: Rc::new(FnInner {
                name,
                brand,
                // Calling a builtin constructor without `new` is not part
                // of the guest contract; reject it as a thrown error.
                body: Box::new(move |_, _, _| {
                    Err(CallError::Thrown(crate::builtins::type_error(format!(
                        "constructor {thrown} requires new"
                    ))))
                }),
                construct: Some(Box::new(construct)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn brand(&self) -> FnBrand {
        self.inner.brand
    }

    /// Allocation identity, stable for the lifetime of the function.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Invoke the function body.
    pub fn call(&self, scope: &mut dyn CallScope, this: HostValue, args: &[HostValue]) -> CallResult {
        (self.inner.body)(scope, this, args)
    }

    /// Invoke the construct path, if any.
    pub fn construct(&self, scope: &mut dyn CallScope, args: &[HostValue]) -> CallResult {
        match &self.inner.construct {
            Some(ctor) => ctor(scope, args),
            None => Err(CallError::Thrown(crate::builtins::type_error(format!(
                "{} is not a constructor",
                self.inner.name
            )))),
        }
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostFunction({})", self.inner.name)
    }
}

/// A dynamically typed host value.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// The "absent" sentinel (`undefined`); encoded as all-zero slot bits.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Rc<SymbolData>),
    /// Mutable byte buffer (the `Uint8Array` analogue).
    Bytes(Rc<RefCell<Vec<u8>>>),
    /// Ordered sequence of values.
    Array(Rc<RefCell<Vec<HostValue>>>),
    /// Property-bearing object.
    Object(Rc<RefCell<HostObject>>),
    Function(HostFunction),
}

impl HostValue {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn number(n: impl Into<f64>) -> Self {
        HostValue::Number(n.into())
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        HostValue::String(Rc::from(s.as_ref()))
    }

    pub fn bytes(data: Vec<u8>) -> Self {
        HostValue::Bytes(Rc::new(RefCell::new(data)))
    }

    pub fn array(items: Vec<HostValue>) -> Self {
        HostValue::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(obj: HostObject) -> Self {
        HostValue::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn empty_object() -> Self {
        Self::object(HostObject::new())
    }

    pub fn function(
        name: impl Into<String>,
        body: impl Fn(&mut dyn CallScope, HostValue, &[HostValue]) -> CallResult + 'static,
    ) -> Self {
        HostValue::Function(HostFunction::new(name, body))
    }

    // ------------------------------------------------------------------
    // Capability checks
    // ------------------------------------------------------------------

    /// Property-bearing or element-bearing receivers. These accept
    /// `valueGet`/`valueIndex`-style operations.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            HostValue::Object(_) | HostValue::Array(_) | HostValue::Bytes(_) | HostValue::Function(_)
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, HostValue::Function(_))
    }

    pub fn is_indexable(&self) -> bool {
        matches!(self, HostValue::Array(_) | HostValue::Bytes(_))
    }

    pub fn is_byte_buffer(&self) -> bool {
        matches!(self, HostValue::Bytes(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Symbol(_) => "symbol",
            HostValue::Bytes(_) => "bytes",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Function(_) => "function",
        }
    }

    /// Allocation identity for heap-backed variants, `None` otherwise.
    ///
    /// This is what makes the reference table identity-keyed: two clones
    /// of one object report the same identity, two structurally equal but
    /// distinct objects do not.
    pub fn heap_identity(&self) -> Option<usize> {
        match self {
            HostValue::Symbol(s) => Some(Rc::as_ptr(s) as *const () as usize),
            HostValue::Bytes(b) => Some(Rc::as_ptr(b) as *const () as usize),
            HostValue::Array(a) => Some(Rc::as_ptr(a) as *const () as usize),
            HostValue::Object(o) => Some(Rc::as_ptr(o) as *const () as usize),
            HostValue::Function(f) => Some(f.identity()),
            _ => None,
        }
    }

    /// Strict equality: value equality for primitives (NaN is unequal to
    /// itself), reference identity for heap-backed variants.
    pub fn strict_eq(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            _ => match (self.heap_identity(), other.heap_identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    // ------------------------------------------------------------------
    // Stringification
    // ------------------------------------------------------------------

    /// Host-string conversion, used by `valuePrepareString`.
    pub fn to_display_string(&self) -> String {
        match self {
            HostValue::Undefined => "undefined".to_string(),
            HostValue::Null => "null".to_string(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Number(n) => format_number(*n),
            HostValue::String(s) => s.to_string(),
            HostValue::Symbol(s) => match &s.description {
                Some(d) => format!("Symbol({d})"),
                None => "Symbol()".to_string(),
            },
            HostValue::Bytes(b) => {
                let b = b.borrow();
                b.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
            }
            HostValue::Array(items) => {
                let items = items.borrow();
                items
                    .iter()
                    .map(|v| match v {
                        // Array holes stringify as empty, per host rules.
                        HostValue::Undefined | HostValue::Null => String::new(),
                        other => other.to_display_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }
            HostValue::Object(obj) => {
                let obj = obj.borrow();
                if obj.is_error {
                    match obj.props.get("message").and_then(|m| m.as_str().map(String::from)) {
                        Some(msg) => format!("Error: {msg}"),
                        None => "Error".to_string(),
                    }
                } else {
                    "[object Object]".to_string()
                }
            }
            HostValue::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        }
    }
}

/// Number-to-string in host (not Rust) style: integral values print
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        // Integral f64 values are exact; zero precision prints them in
        // full even past the i64 range.
        return format!("{n:.0}");
    }
    n.to_string()
}
