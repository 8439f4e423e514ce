//! Monotonic clock collaborator (`performance.now` / `timeOrigin`).

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use wago_value::{HostObject, HostValue};

/// Build the `performance` collaborator object. The origin is the moment
/// of construction; `now()` reports fractional milliseconds since then.
pub fn make_performance() -> HostValue {
    let origin = Instant::now();
    let time_origin = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0;

    let now = HostValue::function("now", move |_, _, _| {
        Ok(HostValue::Number(origin.elapsed().as_secs_f64() * 1000.0))
    });

    HostValue::object(HostObject::with_props([
        ("timeOrigin", HostValue::Number(time_origin)),
        ("now", now),
    ]))
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
    fn now_is_monotonic() {
        let mut scope = InertScope;
        let perf = make_performance();
        let now = get_property(&perf, "now").unwrap();
        let a = call_value(&mut scope, &now, HostValue::Undefined, &[])
            .unwrap()
            .as_f64()
            .unwrap();
        let b = call_value(&mut scope, &now, HostValue::Undefined, &[])
            .unwrap()
            .as_f64()
            .unwrap();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
