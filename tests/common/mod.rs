#![allow(dead_code)]

use promise_plus::{Function, Method, Object, Promise, RunLoop, Scheduler, Value};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A run loop plus its scheduler, with logging set up.
pub fn setup() -> (RunLoop, Scheduler) {
    init_tracing();
    let run_loop = RunLoop::new();
    let scheduler = run_loop.scheduler();
    (run_loop, scheduler)
}

/// Records which callbacks ran, and with what.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<(&'static str, Value)>>>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tag: &'static str) -> impl FnOnce(Value) -> Result<Value, Value> + Send + 'static {
        let calls = self.0.clone();
        move |value| {
            calls.lock().unwrap().push((tag, value.clone()));
            Ok(value)
        }
    }

    pub fn get(&self) -> Vec<(&'static str, Value)> {
        self.0.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.get().into_iter().map(|(tag, _)| tag).collect()
    }
}

/// Callbacks handed to a thenable's `then`, kept for the test to fire later.
#[derive(Debug, Clone, Default)]
pub struct Captured(Arc<Mutex<Option<(Function, Function)>>>);

impl Captured {
    /// A thenable that stores its callbacks here and returns.
    pub fn thenable(&self) -> Value {
        let slot = self.0.clone();
        Value::thenable(move |resolve, reject| {
            *slot.lock().unwrap() = Some((resolve, reject));
            Ok(())
        })
    }

    pub fn resolve(&self, value: impl Into<Value>) {
        let (resolve, _) = self.0.lock().unwrap().clone().expect("then was not called");
        resolve.call1(value).unwrap();
    }

    pub fn reject(&self, reason: impl Into<Value>) {
        let (_, reject) = self.0.lock().unwrap().clone().expect("then was not called");
        reject.call1(reason).unwrap();
    }
}

/// A thenable that settles from a later scheduler turn.
pub fn async_thenable(scheduler: &Scheduler, value: impl Into<Value>, fulfill: bool) -> Value {
    let scheduler = scheduler.clone();
    let value = value.into();
    Value::thenable(move |resolve, reject| {
        let value = value.clone();
        let callback = if fulfill { resolve } else { reject };
        scheduler.enqueue(move || {
            callback.call1(value).unwrap();
        });
        Ok(())
    })
}

/// A thenable that settles inside its own `then` call.
pub fn sync_thenable(value: impl Into<Value>) -> Value {
    let value = value.into();
    Value::thenable(move |resolve, _| {
        resolve.call1(value.clone())?;
        Ok(())
    })
}

/// An object with a `then` member that is not callable.
#[derive(Debug)]
pub struct NotCallable;

impl Object for NotCallable {
    fn then_member(&self) -> Result<Option<Method>, Value> {
        Ok(None)
    }
}

pub fn fulfilled_with(promise: &Promise) -> Option<Value> {
    promise.settlement()?.into_result().ok()
}

pub fn rejected_with(promise: &Promise) -> Option<Value> {
    promise.settlement()?.into_result().err()
}
