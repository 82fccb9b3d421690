use crate::{latch::Latch, promise::Settlement, FailureKind, Function, Promise, Scheduler, Value};

/// The resolve half of a container's capability pair.
///
/// Shares a latch with its [`Reject`]: whichever is called first settles the
/// container, every later call on either one is ignored.
#[derive(Debug, Clone)]
pub struct Resolve {
    promise: Promise,
    latch: Latch,
}

/// The reject half of a container's capability pair.
#[derive(Debug, Clone)]
pub struct Reject {
    promise: Promise,
    latch: Latch,
}

pub(crate) fn pair(promise: &Promise) -> (Resolve, Reject) {
    let latch = Latch::new();
    (
        Resolve {
            promise: promise.clone(),
            latch: latch.clone(),
        },
        Reject {
            promise: promise.clone(),
            latch,
        },
    )
}

impl Resolve {
    /// Resolves with `value`, adopting it if it is a thenable.
    pub fn resolve(&self, value: impl Into<Value>) {
        if self.latch.claim() {
            self.promise.resolve_with(value.into());
        } else {
            tracing::debug!(promise = self.promise.id(), "resolve ignored; already called");
        }
    }

    pub fn is_spent(&self) -> bool {
        self.latch.is_claimed()
    }
}

impl Reject {
    pub fn reject(&self, reason: impl Into<Value>) {
        if self.latch.claim() {
            self.promise.settle(Settlement::Rejected(reason.into()));
        } else {
            tracing::debug!(promise = self.promise.id(), "reject ignored; already called");
        }
    }

    pub(crate) fn fail(&self, reason: Value, kind: FailureKind) {
        if self.latch.claim() {
            self.promise.reject_with(reason, kind);
        } else {
            tracing::debug!(promise = self.promise.id(), %kind, "failure after settling ignored");
        }
    }

    pub fn is_spent(&self) -> bool {
        self.latch.is_claimed()
    }
}

impl From<Resolve> for Function {
    fn from(resolve: Resolve) -> Self {
        Function::new(move |args| {
            resolve.resolve(args.first().cloned().unwrap_or_default());
            Ok(Value::Undefined)
        })
    }
}

impl From<Reject> for Function {
    fn from(reject: Reject) -> Self {
        Function::new(move |args| {
            reject.reject(args.first().cloned().unwrap_or_default());
            Ok(Value::Undefined)
        })
    }
}

impl From<Resolve> for Value {
    fn from(resolve: Resolve) -> Self {
        Value::Function(resolve.into())
    }
}

impl From<Reject> for Value {
    fn from(reject: Reject) -> Self {
        Value::Function(reject.into())
    }
}

/// A container together with the capability pair that settles it, for
/// producers that live outside a resolver closure.
///
/// # Examples
///
/// ```
/// use promise_plus::{Promise, RunLoop, Value};
///
/// let run_loop = RunLoop::new();
/// let deferred = Promise::defer(&run_loop.scheduler());
/// let seen = deferred.promise.then(|v| Ok(v));
/// deferred.resolve("later");
/// deferred.reject("too late");
/// run_loop.run_until_idle();
/// assert_eq!(seen.settlement().unwrap().into_result(), Ok(Value::from("later")));
/// ```
#[derive(Debug, Clone)]
pub struct Deferred {
    pub promise: Promise,
    pub resolve: Resolve,
    pub reject: Reject,
}

impl Deferred {
    pub fn resolve(&self, value: impl Into<Value>) {
        self.resolve.resolve(value)
    }

    pub fn reject(&self, reason: impl Into<Value>) {
        self.reject.reject(reason)
    }
}

impl Promise {
    pub fn defer(scheduler: &Scheduler) -> Deferred {
        let promise = Promise::pending(scheduler);
        let (resolve, reject) = pair(&promise);
        Deferred {
            promise,
            resolve,
            reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Promise, RunLoop, Settlement, Value};

    #[test]
    fn test_defer_resolve_before_then() {
        let run_loop = RunLoop::new();
        let deferred = Promise::defer(&run_loop.scheduler());
        deferred.resolve("value");
        assert!(deferred.resolve.is_spent());
        assert!(deferred.reject.is_spent());
        let seen = deferred.promise.then(Ok);
        run_loop.run_until_idle();
        assert_eq!(seen.settlement(), Some(Settlement::Fulfilled(Value::from("value"))));
    }

    #[test]
    fn test_defer_reject() {
        let run_loop = RunLoop::new();
        let deferred = Promise::defer(&run_loop.scheduler());
        deferred.reject("reason");
        deferred.resolve("ignored");
        run_loop.run_until_idle();
        assert_eq!(
            deferred.promise.settlement(),
            Some(Settlement::Rejected(Value::from("reason")))
        );
    }

    #[test]
    fn test_capabilities_as_functions_share_the_latch() {
        let run_loop = RunLoop::new();
        let deferred = Promise::defer(&run_loop.scheduler());
        let resolve = Value::from(deferred.resolve.clone());
        let reject = Value::from(deferred.reject.clone());
        reject.as_function().unwrap().call1("first").unwrap();
        resolve.as_function().unwrap().call1("second").unwrap();
        run_loop.run_until_idle();
        assert_eq!(
            deferred.promise.settlement(),
            Some(Settlement::Rejected(Value::from("first")))
        );
    }

    #[test]
    fn test_settled_outcome_never_changes() {
        let run_loop = RunLoop::new();
        let deferred = Promise::defer(&run_loop.scheduler());
        deferred.resolve(1);
        run_loop.run_until_idle();
        for i in 0..3 {
            deferred.resolve(i);
            deferred.reject(i);
            run_loop.run_until_idle();
            assert_eq!(
                deferred.promise.settlement(),
                Some(Settlement::Fulfilled(Value::from(1)))
            );
        }
    }
}
