//! Reference table — NaN-boxed value slots and id management.
//!
//! The guest sees every host value as an 8-byte slot that is either a
//! real IEEE-754 float or a NaN-payload-tagged reference id. Internally
//! the two cases are an explicit tagged variant ([`Slot`]); the bit-packed
//! form exists only at the memory boundary.
//!
//! # Encoding
//!
//! ```text
//! all-zero bits            absent value (undefined)
//! any non-NaN f64          that number (0 and -0 never appear here)
//! (0x7FF80000|tag) << 32 | id    reference id with runtime type tag
//!   tag: 0 = other, 1 = object, 2 = string, 3 = symbol, 4 = function
//! ```
//!
//! NaN itself is the reference with id 0; the number 0 is the reference
//! with id 1. Both are preallocated, so a decoded slot is never ambiguous
//! between "number" and "reference".

use std::rc::Rc;

use rustc_hash::FxHashMap;

use wago_value::HostValue;

use crate::error::BridgeError;

/// High 32 bits marking a reference slot (quiet-NaN head).
pub const NAN_HEAD: u32 = 0x7FF8_0000;

/// Ids 0..PREALLOCATED are immortal well-known constants: NaN, 0, null,
/// true, false, the global object, the bridge object.
pub const PREALLOCATED: u32 = 7;

/// Runtime type tag carried in the NaN payload, for the guest runtime's
/// type switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Other = 0,
    Object = 1,
    String = 2,
    Symbol = 3,
    Function = 4,
}

impl TypeTag {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => TypeTag::Object,
            2 => TypeTag::String,
            3 => TypeTag::Symbol,
            4 => TypeTag::Function,
            _ => TypeTag::Other,
        }
    }

    fn for_value(value: &HostValue) -> Self {
        match value {
            HostValue::Object(_) | HostValue::Array(_) | HostValue::Bytes(_) => TypeTag::Object,
            HostValue::String(_) => TypeTag::String,
            HostValue::Symbol(_) => TypeTag::Symbol,
            HostValue::Function(_) => TypeTag::Function,
            _ => TypeTag::Other,
        }
    }
}

/// Decoded form of one 8-byte guest-visible value slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    /// The absent value; all-zero bits.
    Empty,
    /// A real (non-NaN, non-zero) float.
    Number(f64),
    /// A reference id with its type tag.
    Ref { id: u32, tag: TypeTag },
}

impl Slot {
    /// Pack into the guest's 8-byte little-endian form.
    pub fn to_bits(self) -> u64 {
        match self {
            Slot::Empty => 0,
            Slot::Number(n) => {
                // The table never emits NaN or 0 through this arm, but
                // stay well-formed if one slips in.
                if n.is_nan() {
                    (NAN_HEAD as u64) << 32
                } else if n == 0.0 {
                    0
                } else {
                    n.to_bits()
                }
            }
            Slot::Ref { id, tag } => ((NAN_HEAD | tag as u32) as u64) << 32 | id as u64,
        }
    }

    /// Decode from the guest's 8-byte form.
    pub fn from_bits(bits: u64) -> Self {
        let f = f64::from_bits(bits);
        if f == 0.0 {
            // Covers the all-zero absence encoding and a raw -0.0.
            return Slot::Empty;
        }
        if !f.is_nan() {
            return Slot::Number(f);
        }
        Slot::Ref {
            id: bits as u32,
            tag: TypeTag::from_bits((bits >> 32) as u32 & 0x7),
        }
    }
}

/// Reverse-lookup key: identity for heap values, content for strings,
/// the preallocated constants for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RefKey {
    Zero,
    Null,
    Bool(bool),
    Str(Rc<str>),
    Heap(usize),
}

impl RefKey {
    fn for_value(value: &HostValue) -> Option<RefKey> {
        match value {
            HostValue::Number(n) if *n == 0.0 => Some(RefKey::Zero),
            HostValue::Null => Some(RefKey::Null),
            HostValue::Bool(b) => Some(RefKey::Bool(*b)),
            HostValue::String(s) => Some(RefKey::Str(Rc::clone(s))),
            other => other.heap_identity().map(RefKey::Heap),
        }
    }
}

struct Entry {
    value: HostValue,
    /// Live references the guest holds. Immortal ids ignore this.
    count: u32,
}

/// Bidirectional value ↔ id mapping with reference counting and id reuse.
///
/// The table is a bijection restricted to currently referenced values:
/// each live id maps to exactly one host value, and each referenced value
/// has exactly one id. A guest that never releases an id leaks that table
/// slot — accepted, per the upstream guest-runtime contract.
pub struct RefTable {
    entries: Vec<Option<Entry>>,
    ids: FxHashMap<RefKey, u32>,
    pool: Vec<u32>,
}

impl RefTable {
    /// Build a table seeded with the preallocated constants. `globals` and
    /// `bridge` become ids 5 and 6.
    pub fn new(globals: HostValue, bridge: HostValue) -> Self {
        let constants = [
            HostValue::Number(f64::NAN),
            HostValue::Number(0.0),
            HostValue::Null,
            HostValue::Bool(true),
            HostValue::Bool(false),
            globals,
            bridge,
        ];
        let mut ids = FxHashMap::default();
        let mut entries = Vec::with_capacity(constants.len());
        for (id, value) in constants.into_iter().enumerate() {
            if let Some(key) = RefKey::for_value(&value) {
                ids.insert(key, id as u32);
            }
            entries.push(Some(Entry { value, count: 0 }));
        }
        Self {
            entries,
            ids,
            pool: Vec::new(),
        }
    }

    /// Encode a host value into a slot, allocating or bumping an id when
    /// the value is reference-typed.
    pub fn store(&mut self, value: &HostValue) -> Slot {
        match value {
            HostValue::Undefined => Slot::Empty,
            HostValue::Number(n) if *n != 0.0 => {
                if n.is_nan() {
                    Slot::Ref {
                        id: 0,
                        tag: TypeTag::Other,
                    }
                } else {
                    Slot::Number(*n)
                }
            }
            other => {
                // 0 and -0 land here too: they alias preallocated id 1.
                let key = match RefKey::for_value(other) {
                    Some(key) => key,
                    // Unreachable by construction; encode as absence.
                    None => return Slot::Empty,
                };
                let id = match self.ids.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = match self.pool.pop() {
                            Some(id) => id,
                            None => {
                                self.entries.push(None);
                                (self.entries.len() - 1) as u32
                            }
                        };
                        self.entries[id as usize] = Some(Entry {
                            value: other.clone(),
                            count: 0,
                        });
                        self.ids.insert(key, id);
                        id
                    }
                };
                if id >= PREALLOCATED {
                    if let Some(Some(entry)) = self.entries.get_mut(id as usize) {
                        entry.count += 1;
                    }
                }
                Slot::Ref {
                    id,
                    tag: TypeTag::for_value(other),
                }
            }
        }
    }

    /// Decode a slot back into a host value.
    pub fn load(&self, slot: Slot) -> Result<HostValue, BridgeError> {
        match slot {
            Slot::Empty => Ok(HostValue::Undefined),
            Slot::Number(n) => Ok(HostValue::Number(n)),
            Slot::Ref { id, .. } => self
                .entries
                .get(id as usize)
                .and_then(Option::as_ref)
                .map(|entry| entry.value.clone())
                .ok_or(BridgeError::BadRef(id)),
        }
    }

    /// Drop one guest reference to `id`. At zero the slot is cleared, the
    /// reverse mapping removed, and the id returned to the pool.
    /// Preallocated ids are immortal; releasing them is a no-op, as is
    /// releasing an id that is no longer live.
    pub fn release(&mut self, id: u32) {
        if id < PREALLOCATED {
            return;
        }
        let Some(slot) = self.entries.get_mut(id as usize) else {
            return;
        };
        let Some(entry) = slot else {
            return;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count == 0 {
            if let Some(key) = RefKey::for_value(&entry.value) {
                self.ids.remove(&key);
            }
            *slot = None;
            self.pool.push(id);
        }
    }

    /// Number of live (non-recycled) entries, preallocated ids included.
    pub fn live_len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Whether `id` currently maps to a live value.
    pub fn is_live(&self, id: u32) -> bool {
        matches!(self.entries.get(id as usize), Some(Some(_)))
    }

    /// Discard everything; used when the guest exits.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.ids.clear();
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RefTable {
        RefTable::new(HostValue::empty_object(), HostValue::empty_object())
    }

    #[test]
    fn numbers_pass_through_as_floats() {
        let mut refs = table();
        for n in [1.0, -1.5, 1e300, f64::MIN_POSITIVE] {
            let slot = refs.store(&HostValue::Number(n));
            assert_eq!(slot, Slot::Number(n));
            let bits = slot.to_bits();
            assert_eq!(Slot::from_bits(bits), Slot::Number(n));
            assert_eq!(refs.load(Slot::from_bits(bits)).unwrap().as_f64(), Some(n));
        }
    }

    #[test]
    fn nan_zero_and_absence_are_distinguishable() {
        let mut refs = table();

        let nan = refs.store(&HostValue::Number(f64::NAN));
        assert_eq!(nan, Slot::Ref { id: 0, tag: TypeTag::Other });
        assert!(refs.load(nan).unwrap().as_f64().unwrap().is_nan());

        let zero = refs.store(&HostValue::Number(0.0));
        assert_eq!(zero, Slot::Ref { id: 1, tag: TypeTag::Other });
        let neg_zero = refs.store(&HostValue::Number(-0.0));
        assert_eq!(neg_zero, zero);

        let absent = refs.store(&HostValue::Undefined);
        assert_eq!(absent.to_bits(), 0);
        assert!(refs.load(Slot::from_bits(0)).unwrap().is_undefined());

        // A reference slot never decodes as a number, and vice versa.
        let obj = refs.store(&HostValue::empty_object());
        match Slot::from_bits(obj.to_bits()) {
            Slot::Ref { tag: TypeTag::Object, .. } => {}
            other => panic!("expected object ref, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_preserves_identity() {
        let mut refs = table();
        let obj = HostValue::empty_object();
        let slot = refs.store(&obj);
        let loaded = refs.load(slot).unwrap();
        assert!(loaded.strict_eq(&obj));

        let s = HostValue::string("héllo");
        let slot = refs.store(&s);
        assert!(refs.load(slot).unwrap().strict_eq(&s));
    }

    #[test]
    fn same_value_reuses_one_id() {
        let mut refs = table();
        let obj = HostValue::empty_object();
        let a = refs.store(&obj);
        let b = refs.store(&obj.clone());
        assert_eq!(a, b);

        // Strings key by content, not allocation.
        let s1 = refs.store(&HostValue::string("x"));
        let s2 = refs.store(&HostValue::string("x"));
        assert_eq!(s1, s2);
    }

    #[test]
    fn refcount_returns_id_to_pool_exactly_once() {
        let mut refs = table();
        let obj = HostValue::empty_object();
        let Slot::Ref { id, .. } = refs.store(&obj) else {
            panic!("expected ref slot")
        };
        refs.store(&obj);
        refs.store(&obj);

        refs.release(id);
        refs.release(id);
        assert!(refs.is_live(id), "entry must survive until the last release");
        refs.release(id);
        assert!(!refs.is_live(id));

        // Releasing again is a no-op, and the id comes back out of the pool.
        refs.release(id);
        let Slot::Ref { id: next, .. } = refs.store(&HostValue::empty_object()) else {
            panic!("expected ref slot")
        };
        assert_eq!(next, id);
    }

    #[test]
    fn preallocated_ids_are_immortal() {
        let mut refs = table();
        for id in 0..PREALLOCATED {
            refs.release(id);
            refs.release(id);
            assert!(refs.is_live(id));
        }
        assert_eq!(refs.store(&HostValue::Null), Slot::Ref { id: 2, tag: TypeTag::Other });
        assert_eq!(refs.store(&HostValue::Bool(true)), Slot::Ref { id: 3, tag: TypeTag::Other });
        assert_eq!(refs.store(&HostValue::Bool(false)), Slot::Ref { id: 4, tag: TypeTag::Other });
    }

    #[test]
    fn type_tags_follow_the_runtime_type_switch() {
        let mut refs = table();
        let cases: [(HostValue, TypeTag); 4] = [
            (HostValue::string("s"), TypeTag::String),
            (HostValue::bytes(vec![1]), TypeTag::Object),
            (HostValue::array(vec![]), TypeTag::Object),
            (
                HostValue::function("f", |_, _, _| Ok(HostValue::Undefined)),
                TypeTag::Function,
            ),
        ];
        for (value, expected) in cases {
            match refs.store(&value) {
                Slot::Ref { tag, .. } => assert_eq!(tag, expected),
                other => panic!("expected ref slot, got {other:?}"),
            }
        }
    }
}
