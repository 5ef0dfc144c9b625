use std::time::{SystemTime, UNIX_EPOCH};

use crate::callable::{Callable, NativeFunction};
use crate::environment::Environment;
use crate::value::Value;

/// Seconds since the Unix epoch, with sub-second precision.
pub fn clock(_: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Value::Number(seconds)
}

const NATIVES: &[NativeFunction] = &[NativeFunction {
    name: "clock",
    arity: 0,
    function: clock,
}];

/// Registers every native function in `globals`.
pub fn define_natives(globals: &Environment) {
    for native in NATIVES {
        globals.define(native.name, Value::Callable(Callable::Native(*native)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_positive_seconds() {
        let Value::Number(now) = clock(&[]) else {
            panic!("clock should return a number");
        };
        assert!(now > 1_000_000_000.0);
    }

    #[test]
    fn test_define_natives() {
        let globals = Environment::global();
        define_natives(&globals);
        let Ok(Value::Callable(clock)) = globals.get("clock") else {
            panic!("clock should be defined");
        };
        assert_eq!(clock.arity(), 0);
        assert_eq!(clock.to_string(), "<native fn>");
    }
}
