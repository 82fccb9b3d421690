//! The container itself.
//!
//! A [`Promise`] starts pending and settles at most once, to either a
//! fulfillment value or a rejection reason. Settling and running
//! continuations always happen on the container's [`Scheduler`], never inside
//! the call that caused them.
//!
use crate::{
    adoption::{self, Adoption, Thenable},
    capability::{self, Reject, Resolve},
    latch::Latch,
    Error, FailureKind, Function, Scheduler, Value,
};
use std::{
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll, Waker},
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A continuation callback. Returning `Err` rejects the downstream container
/// with that reason.
pub type Callback = Box<dyn FnOnce(Value) -> Result<Value, Value> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// The fixed outcome of a settled container.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Fulfilled(Value),
    Rejected(Value),
}

impl Settlement {
    pub fn state(&self) -> State {
        match self {
            Settlement::Fulfilled(_) => State::Fulfilled,
            Settlement::Rejected(_) => State::Rejected,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Settlement::Fulfilled(value) | Settlement::Rejected(value) => value,
        }
    }

    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Settlement::Fulfilled(value) => Ok(value),
            Settlement::Rejected(reason) => Err(reason),
        }
    }
}

/// A deferred value. Cloning gives another handle to the same container.
///
/// # Examples
///
/// ```
/// use promise_plus::{Promise, RunLoop, Value};
///
/// let run_loop = RunLoop::new();
/// let doubled = Promise::new(&run_loop.scheduler(), |resolve, _reject| {
///     resolve.resolve(5);
///     Ok(())
/// })
/// .then(|v| Ok(Value::from(v.as_number().unwrap_or_default() * 2.0)));
///
/// run_loop.run_until_idle();
/// assert_eq!(doubled.settlement().unwrap().into_result(), Ok(Value::from(10)));
/// ```
#[derive(Clone)]
pub struct Promise {
    shared: Arc<Shared>,
}

struct Shared {
    id: u64,
    scheduler: Scheduler,
    inner: Mutex<Inner>,
}

struct Inner {
    settlement: Option<Settlement>,
    listeners: Vec<Reaction>,
    // Set once the listeners present at settlement have run.
    drained: bool,
    wakers: Vec<Waker>,
}

/// A registered `then`: the optional callbacks plus the container their
/// result feeds.
struct Reaction {
    on_fulfilled: Option<Callback>,
    on_rejected: Option<Callback>,
    downstream: Promise,
}

impl Reaction {
    fn run(self, settlement: Settlement) {
        let (callback, value, fulfilled) = match settlement {
            Settlement::Fulfilled(value) => (self.on_fulfilled, value, true),
            Settlement::Rejected(reason) => (self.on_rejected, reason, false),
        };
        match callback {
            Some(callback) => match callback(value) {
                Ok(value) => self.downstream.resolve_with(value),
                Err(reason) => self.downstream.reject_with(reason, FailureKind::Callback),
            },
            None if fulfilled => self.downstream.resolve_with(value),
            None => self.downstream.settle(Settlement::Rejected(value)),
        }
    }
}

impl Promise {
    /// Creates a container and runs `resolver` right away with its
    /// resolve/reject pair. An `Err` from the resolver rejects the container
    /// unless it was already resolved or rejected.
    pub fn new<F>(scheduler: &Scheduler, resolver: F) -> Promise
    where
        F: FnOnce(Resolve, Reject) -> Result<(), Value>,
    {
        let promise = Promise::pending(scheduler);
        let (resolve, reject) = capability::pair(&promise);
        if let Err(reason) = resolver(resolve, reject.clone()) {
            reject.fail(reason, FailureKind::Resolver);
        }
        promise
    }

    /// Creates a container from a dynamic resolver. Anything but a
    /// [`Value::Function`] is refused before any work is done.
    pub fn from_resolver(scheduler: &Scheduler, resolver: &Value) -> Result<Promise, Error> {
        let Value::Function(resolver) = resolver else {
            return Err(Error::InvalidResolver {
                kind: resolver.kind(),
            });
        };
        Ok(Promise::new(scheduler, |resolve, reject| {
            resolver.call(&[resolve.into(), reject.into()]).map(drop)
        }))
    }

    /// A container nobody but the crate can settle.
    pub fn pending(scheduler: &Scheduler) -> Promise {
        Promise {
            shared: Arc::new(Shared {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                scheduler: scheduler.clone(),
                inner: Mutex::new(Inner {
                    settlement: None,
                    listeners: vec![],
                    drained: false,
                    wakers: vec![],
                }),
            }),
        }
    }

    /// A container that adopts `value`.
    pub fn resolve(scheduler: &Scheduler, value: impl Into<Value>) -> Promise {
        Promise::new(scheduler, |resolve, _| {
            resolve.resolve(value);
            Ok(())
        })
    }

    /// A container rejected with `reason`.
    pub fn reject(scheduler: &Scheduler, reason: impl Into<Value>) -> Promise {
        Promise::new(scheduler, |_, reject| {
            reject.reject(reason);
            Ok(())
        })
    }

    /// Registers callbacks for the outcome and returns the container that
    /// receives their result. A missing callback passes the outcome through.
    pub fn then_with(&self, on_fulfilled: Option<Callback>, on_rejected: Option<Callback>) -> Promise {
        let downstream = Promise::pending(self.scheduler());
        let reaction = Reaction {
            on_fulfilled,
            on_rejected,
            downstream: downstream.clone(),
        };
        let mut inner = self.lock();
        match inner.settlement.clone() {
            None => inner.listeners.push(reaction),
            Some(settlement) => {
                drop(inner);
                tracing::trace!(
                    promise = self.shared.id,
                    downstream = downstream.shared.id,
                    "reaction scheduled on settled promise"
                );
                self.shared
                    .scheduler
                    .enqueue(move || reaction.run(settlement));
            }
        }
        downstream
    }

    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), None)
    }

    pub fn catch<G>(&self, on_rejected: G) -> Promise
    where
        G: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then_with(None, Some(Box::new(on_rejected)))
    }

    pub fn then_catch<F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
        G: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    /// `then` with dynamic callbacks. Arguments that are not functions are
    /// ignored.
    pub fn then_values(&self, on_fulfilled: &Value, on_rejected: &Value) -> Promise {
        fn callback(value: &Value) -> Option<Callback> {
            let f = value.as_function()?.clone();
            Some(Box::new(move |arg: Value| f.call1(arg)))
        }
        self.then_with(callback(on_fulfilled), callback(on_rejected))
    }

    pub fn state(&self) -> State {
        self.lock()
            .settlement
            .as_ref()
            .map_or(State::Pending, Settlement::state)
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == State::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    pub fn settlement(&self) -> Option<Settlement> {
        self.lock().settlement.clone()
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Settles this container with `x`, adopting `x` if it is thenable.
    pub(crate) fn resolve_with(&self, x: Value) {
        if let Value::Promise(p) = &x {
            if p.ptr_eq(self) {
                tracing::debug!(promise = self.shared.id, "promise resolved with itself");
                self.settle(Settlement::Fulfilled(x));
                return;
            }
        }
        match adoption::probe(&x) {
            Ok(Adoption::Plain) => self.settle(Settlement::Fulfilled(x)),
            Ok(Adoption::Thenable(thenable)) => self.adopt(x, thenable),
            Err(reason) => self.reject_with(reason, FailureKind::Adoption),
        }
    }

    /// Follows `thenable` (which is `x`). Only the first of its callbacks, or
    /// a synchronous failure of the call, counts.
    fn adopt(&self, x: Value, thenable: Thenable) {
        let latch = Latch::new();
        let on_fulfilled = {
            let (target, latch) = (self.clone(), latch.clone());
            Function::new(move |args| {
                let y = args.first().cloned().unwrap_or_default();
                if !latch.claim() {
                    tracing::debug!(promise = target.shared.id, "late thenable fulfillment ignored");
                } else if y.same(&x) {
                    target.settle(Settlement::Fulfilled(y));
                } else {
                    target.resolve_with(y);
                }
                Ok(Value::Undefined)
            })
        };
        let on_rejected = {
            let (target, latch) = (self.clone(), latch.clone());
            Function::new(move |args| {
                if latch.claim() {
                    target.settle(Settlement::Rejected(args.first().cloned().unwrap_or_default()));
                } else {
                    tracing::debug!(promise = target.shared.id, "late thenable rejection ignored");
                }
                Ok(Value::Undefined)
            })
        };
        if let Err(reason) = thenable.invoke(on_fulfilled, on_rejected) {
            if latch.claim() {
                self.reject_with(reason, FailureKind::Adoption);
            } else {
                tracing::debug!(
                    promise = self.shared.id,
                    "then failed after settling its promise; ignored"
                );
            }
        }
    }

    pub(crate) fn reject_with(&self, reason: Value, kind: FailureKind) {
        tracing::debug!(promise = self.shared.id, %kind, reason = ?reason, "failure converted to rejection");
        self.settle(Settlement::Rejected(reason));
    }

    /// Queues the state transition.
    pub(crate) fn settle(&self, settlement: Settlement) {
        let promise = self.clone();
        tracing::trace!(promise = self.shared.id, state = ?settlement.state(), "settlement scheduled");
        self.shared
            .scheduler
            .enqueue(move || promise.transition(settlement));
    }

    fn transition(&self, settlement: Settlement) {
        let listeners = {
            let mut inner = self.lock();
            if inner.settlement.is_some() {
                tracing::debug!(promise = self.shared.id, "already settled; transition ignored");
                return;
            }
            inner.settlement = Some(settlement.clone());
            mem::take(&mut inner.listeners)
        };
        tracing::trace!(
            promise = self.shared.id,
            state = ?settlement.state(),
            listeners = listeners.len(),
            "settled"
        );
        for reaction in listeners {
            reaction.run(settlement.clone());
        }
        let wakers = {
            let mut inner = self.lock();
            inner.drained = true;
            mem::take(&mut inner.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Ready once the container has settled and the listeners registered before
/// settlement have run. [`Promise::settlement`] can report the outcome
/// slightly earlier, while those listeners are still running.
impl Future for Promise {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.lock();
        match inner.settlement.clone().filter(|_| inner.drained) {
            Some(settlement) => Poll::Ready(settlement.into_result()),
            None => {
                if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
