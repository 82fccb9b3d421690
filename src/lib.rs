//! Promises/A+ style deferred values.
//!
//! A [`Promise`] eventually settles to exactly one of a fulfillment value or
//! a rejection reason. Consumers attach continuations with
//! [`Promise::then_with`] (or [`then`](Promise::then) /
//! [`catch`](Promise::catch)) whether or not the outcome is known yet, and
//! every continuation runs later, on the container's [`Scheduler`].
//!
//! Resolving a container with another container, or with any foreign value
//! exposing a callable `then` member, adopts that value's eventual outcome.
//! [`Promise::all`] and [`Promise::hash`] combine many containers into one.
//!
//! # Examples
//!
//! ```
//! use promise_plus::{Promise, RunLoop, Value};
//!
//! let run_loop = RunLoop::new();
//! let scheduler = run_loop.scheduler();
//!
//! let deferred = Promise::defer(&scheduler);
//! let sum = Promise::all(&scheduler, [Value::from(deferred.promise.clone()), Value::from(2)])
//!     .then(|values| {
//!         let total: f64 = values.as_list().unwrap_or_default().iter().filter_map(Value::as_number).sum();
//!         Ok(Value::from(total))
//!     });
//!
//! deferred.resolve(40);
//! run_loop.run_until_idle();
//! assert_eq!(sum.settlement().unwrap().into_result(), Ok(Value::from(42)));
//! ```
//!
pub mod adoption;
mod capability;
mod combinators;
mod error;
mod latch;
mod promise;
pub mod scheduler;
mod value;

pub use capability::{Deferred, Reject, Resolve};
pub use error::{Error, FailureKind};
pub use promise::{Callback, Promise, Settlement, State};
pub use scheduler::{RunLoop, Schedule, Scheduler, Task, ThreadScheduler, ThreadSchedulerConfig};
pub use value::{Function, Method, Object, Value};
