//! The bridge object and function wrappers.
//!
//! The guest exports its own functions to the host by id: it asks the
//! bridge object's `_makeFuncWrapper(id)` for a host function that, when
//! called, parks an event `{id, this, args}` in `_pendingEvent`, resumes
//! the guest so its scheduler can dispatch the event, and then returns
//! whatever the guest wrote into the event's `result` property.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wago_value::object::get_property;
use wago_value::{CallError, FaultError, HostObject, HostValue};

/// Build the bridge object the guest runtime sees as reference id 6.
///
/// Starts with only the wrapper factory; the guest itself parks
/// `_pendingEvent` on it, and embedders may attach more properties.
pub fn make_bridge_object() -> HostValue {
    let obj = Rc::new(RefCell::new(HostObject::new()));
    // The wrapper must not keep the bridge object alive: the wrapper is
    // stored in guest-reachable state, which the bridge object owns
    // transitively through the reference table.
    let weak = Rc::downgrade(&obj);
    let factory = HostValue::function("_makeFuncWrapper", move |_, _, args| {
        let id = args
            .first()
            .and_then(HostValue::as_f64)
            .ok_or_else(|| CallError::Fatal(FaultError::contract("function wrapper id must be a number")))?;
        Ok(make_func_wrapper(weak.clone(), id))
    });
    obj.borrow_mut()
        .props
        .insert("_makeFuncWrapper".to_string(), factory);
    HostValue::Object(obj)
}

fn make_func_wrapper(bridge: Weak<RefCell<HostObject>>, id: f64) -> HostValue {
    HostValue::function("wrapped", move |scope, this, args| {
        let bridge = match bridge.upgrade() {
            Some(bridge) => bridge,
            None => return Err(FaultError::Exited.into()),
        };
        let event = HostValue::object(HostObject::with_props([
            ("id", HostValue::Number(id)),
            ("this", this),
            ("args", HostValue::array(args.to_vec())),
        ]));
        bridge
            .borrow_mut()
            .props
            .insert("_pendingEvent".to_string(), event.clone());
        scope.resume()?;
        Ok(get_property(&event, "result")?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use wago_value::object::set_property;
    use wago_value::{call_value, CallScope};

    /// Plays the guest's role: on resume, consume the pending event and
    /// write an answer into its `result` property.
    struct ScriptedGuest {
        bridge: HostValue,
        answer: HostValue,
        seen_ids: Vec<f64>,
        seen_args: usize,
    }

    impl CallScope for ScriptedGuest {
        fn resume(&mut self) -> Result<(), FaultError> {
            let event = get_property(&self.bridge, "_pendingEvent")?;
            set_property(&self.bridge, "_pendingEvent", HostValue::Null)?;
            if let Some(id) = get_property(&event, "id")?.as_f64() {
                self.seen_ids.push(id);
            }
            self.seen_args = wago_value::object::length_of(&get_property(&event, "args")?)? as usize;
            set_property(&event, "result", self.answer.clone())?;
            Ok(())
        }
    }

    #[test]
    fn wrapper_parks_event_and_returns_its_result() {
        let bridge = make_bridge_object();
        let factory = get_property(&bridge, "_makeFuncWrapper").unwrap();

        let mut guest = ScriptedGuest {
            bridge: bridge.clone(),
            answer: HostValue::string("done"),
            seen_ids: Vec::new(),
            seen_args: 0,
        };

        let wrapper = call_value(
            &mut guest,
            &factory,
            bridge.clone(),
            &[HostValue::Number(7.0)],
        )
        .unwrap();
        assert!(wrapper.is_callable());

        let out = call_value(
            &mut guest,
            &wrapper,
            HostValue::Undefined,
            &[HostValue::Number(1.0), HostValue::Bool(true)],
        )
        .unwrap();
        assert_eq!(out.as_str(), Some("done"));
        assert_eq!(guest.seen_ids, vec![7.0]);
        assert_eq!(guest.seen_args, 2);

        // The event was consumed.
        let pending = get_property(&bridge, "_pendingEvent").unwrap();
        assert!(pending.strict_eq(&HostValue::Null));
    }

    #[test]
    fn wrapper_after_teardown_is_fatal() {
        let bridge = make_bridge_object();
        let factory = get_property(&bridge, "_makeFuncWrapper").unwrap();
        let mut guest = ScriptedGuest {
            bridge: bridge.clone(),
            answer: HostValue::Undefined,
            seen_ids: Vec::new(),
            seen_args: 0,
        };
        let wrapper =
            call_value(&mut guest, &factory, bridge.clone(), &[HostValue::Number(1.0)]).unwrap();

        guest.bridge = HostValue::Null;
        drop(bridge);
        drop(factory);

        let err = call_value(&mut guest, &wrapper, HostValue::Undefined, &[]);
        assert!(matches!(err, Err(CallError::Fatal(FaultError::Exited))));
    }
}
