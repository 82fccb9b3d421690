//! Thenable detection.
//!
//! [`probe`] is the only place a value's `then` member is read. It turns an
//! arbitrary [`Value`] into a typed [`Adoption`], so the resolution procedure
//! branches on a tag instead of poking at members itself.
//!
use crate::{Function, Method, Promise, Value};

/// What the resolution procedure should do with a value.
pub enum Adoption {
    /// The value exposes a callable `then` and must be adopted.
    Thenable(Thenable),
    /// Anything else fulfills directly.
    Plain,
}

/// Something with a callable `then`, bound to its receiver.
pub enum Thenable {
    Native(Promise),
    Foreign { receiver: Value, then: Method },
}

impl Thenable {
    /// Calls `then(on_fulfilled, on_rejected)` on the receiver. An `Err` is a
    /// synchronous failure of the call itself.
    pub fn invoke(&self, on_fulfilled: Function, on_rejected: Function) -> Result<(), Value> {
        match self {
            Thenable::Native(promise) => {
                promise.then_catch(
                    move |value| on_fulfilled.call1(value),
                    move |reason| on_rejected.call1(reason),
                );
                Ok(())
            }
            Thenable::Foreign { receiver, then } => {
                then(receiver, &[on_fulfilled.into(), on_rejected.into()]).map(drop)
            }
        }
    }
}

/// Reads `value.then` once. A failed read comes back as `Err(reason)`.
pub fn probe(value: &Value) -> Result<Adoption, Value> {
    match value {
        Value::Promise(promise) => Ok(Adoption::Thenable(Thenable::Native(promise.clone()))),
        Value::Object(object) => Ok(match object.then_member()? {
            Some(then) => Adoption::Thenable(Thenable::Foreign {
                receiver: value.clone(),
                then,
            }),
            None => Adoption::Plain,
        }),
        _ => Ok(Adoption::Plain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Object, RunLoop};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[derive(Debug)]
    struct ThrowingGetter;

    impl Object for ThrowingGetter {
        fn then_member(&self) -> Result<Option<Method>, Value> {
            Err(Value::from("getter exploded"))
        }
    }

    #[derive(Debug, Default)]
    struct CountingGetter(AtomicUsize);

    impl Object for CountingGetter {
        fn then_member(&self) -> Result<Option<Method>, Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[test]
    fn test_plain_values_are_not_thenable() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::from(5),
            Value::from("then"),
            Value::from(vec![Value::from(1)]),
            Value::function(|_| Ok(Value::Undefined)),
        ] {
            assert!(matches!(probe(&value), Ok(Adoption::Plain)), "{value:?}");
        }
    }

    #[test]
    fn test_promises_are_native_thenables() {
        let run_loop = RunLoop::new();
        let promise = Promise::pending(&run_loop.scheduler());
        match probe(&Value::from(promise.clone())) {
            Ok(Adoption::Thenable(Thenable::Native(p))) => assert!(p.ptr_eq(&promise)),
            _ => panic!("a promise should probe as a native thenable"),
        }
    }

    #[test]
    fn test_failed_read_is_reported() {
        match probe(&Value::object(ThrowingGetter)) {
            Err(reason) => assert_eq!(reason, Value::from("getter exploded")),
            Ok(_) => panic!("expected the read to fail"),
        }
    }

    #[test]
    fn test_then_member_is_read_once() {
        let getter = Arc::new(CountingGetter::default());
        let value = Value::Object(getter.clone());
        assert!(matches!(probe(&value), Ok(Adoption::Plain)));
        assert_eq!(getter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_foreign_then_gets_receiver() {
        let seen = Arc::new(Mutex::new(None));
        #[derive(Debug)]
        struct Recording(Arc<Mutex<Option<Value>>>);
        impl Object for Recording {
            fn then_member(&self) -> Result<Option<Method>, Value> {
                let seen = self.0.clone();
                Ok(Some(Arc::new(move |this: &Value, _args: &[Value]| -> Result<Value, Value> {
                    *seen.lock().unwrap() = Some(this.clone());
                    Ok(Value::Undefined)
                })))
            }
        }
        let value = Value::object(Recording(seen.clone()));
        let Ok(Adoption::Thenable(thenable)) = probe(&value) else {
            panic!("expected a foreign thenable");
        };
        let noop = Function::new(|_| Ok(Value::Undefined));
        thenable.invoke(noop.clone(), noop).unwrap();
        let this = seen.lock().unwrap().clone().unwrap();
        assert!(this.same(&value));
    }
}
