//! Task schedulers that containers defer their work onto.
//!
//! Every settlement and every continuation runs as a [`Task`] on a
//! [`Scheduler`], never inside the call that triggered it. Two backends are
//! provided: [`RunLoop`], a deterministic queue drained by the caller, and
//! [`ThreadScheduler`], a worker thread fed by a multi-producer channel.
//!
use crate::Error;
use std::{
    any::Any,
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{channel, Sender},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A FIFO task queue.
///
/// Implementations must run tasks in submission order and must never run a
/// task from inside the `enqueue` call that submitted it.
pub trait Schedule: Send + Sync {
    fn enqueue(&self, task: Task);
}

/// Shared handle to a [`Schedule`] implementation. Containers carry one and
/// hand it down to every container derived from them.
#[derive(Clone)]
pub struct Scheduler(Arc<dyn Schedule>);

impl Scheduler {
    pub fn new(schedule: impl Schedule + 'static) -> Self {
        Self(Arc::new(schedule))
    }

    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        self.0.enqueue(Box::new(task))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scheduler").finish()
    }
}

/// Single-threaded run loop. Tasks pile up until the owner drains them with
/// [`RunLoop::turn`] or [`RunLoop::run_until_idle`]. A panicking task unwinds
/// into the caller of `turn`; the rest of the queue is left intact.
///
/// # Examples
///
/// ```
/// use promise_plus::{Promise, RunLoop, Value};
///
/// let run_loop = RunLoop::new();
/// let promise = Promise::resolve(&run_loop.scheduler(), 5).then(|v| match v {
///     Value::Number(n) => Ok(Value::from(n * 2.0)),
///     other => Err(other),
/// });
/// assert!(promise.is_pending());
/// run_loop.run_until_idle();
/// assert_eq!(promise.settlement().unwrap().into_result(), Ok(Value::from(10)));
/// ```
#[derive(Clone, Default)]
pub struct RunLoop {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.clone())
    }

    /// Runs the oldest queued task. Returns `false` if there was none.
    pub fn turn(&self) -> bool {
        // The lock is released before the task runs so it can enqueue more.
        let task = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including tasks enqueued along
    /// the way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.turn() {
            ran += 1;
        }
        tracing::trace!(tasks = ran, "run loop idle");
        ran
    }

    /// Runs at most `max` tasks.
    pub fn run_for(&self, max: usize) -> usize {
        let mut ran = 0;
        while ran < max && self.turn() {
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Schedule for RunLoop {
    fn enqueue(&self, task: Task) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop").field("queued", &self.len()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct ThreadSchedulerConfig {
    pub thread_name: String,
}

impl Default for ThreadSchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: "promise-scheduler".into(),
        }
    }
}

/// A scheduler backed by one worker thread. The channel keeps submissions in
/// order and the single consumer runs them one at a time.
///
/// A task that panics is logged at `error` and the worker moves on to the
/// next one. Whatever that task would have settled stays pending.
///
/// The worker exits once every handle is gone, including the [`Scheduler`]s
/// held by containers created on it, or on [`ThreadScheduler::shutdown`].
/// A container fulfilled with itself keeps its handle alive for good, so a
/// worker that ever ran one only stops through `shutdown`.
///
/// # Examples
///
/// ```
/// use promise_plus::{Promise, ThreadScheduler, Value};
/// use futures::executor::block_on;
///
/// let worker = ThreadScheduler::spawn(Default::default()).unwrap();
/// let promise = Promise::resolve(&worker.scheduler(), "🍓");
/// assert_eq!(block_on(promise), Ok(Value::from("🍓")));
/// worker.shutdown().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    inner: Arc<Worker>,
}

#[derive(Debug)]
struct Worker {
    sender: Mutex<Option<Sender<Task>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn spawn(config: ThreadSchedulerConfig) -> Result<Self, Error> {
        let (tx, rx) = channel::<Task>();
        let name = config.thread_name.clone();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                for task in rx {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        tracing::error!(
                            thread = %name,
                            panic = panic_message(&*payload),
                            "scheduled task panicked"
                        );
                    }
                }
                tracing::debug!(thread = %name, "scheduler worker stopped");
            })
            .map_err(|err| Error::Spawn(err.to_string()))?;
        tracing::debug!(thread = %config.thread_name, "scheduler worker started");
        Ok(Self {
            inner: Arc::new(Worker {
                sender: Mutex::new(Some(tx)),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.clone())
    }

    pub fn try_enqueue(&self, task: Task) -> Result<(), Error> {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| Error::SchedulerClosed),
            None => Err(Error::SchedulerClosed),
        }
    }

    /// Stops accepting tasks, lets the worker finish what is queued and joins
    /// it. Calling this from a task on the worker itself only closes the queue.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .inner
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) if handle.thread().id() != thread::current().id() => {
                handle.join().map_err(|_| Error::WorkerPanicked)
            }
            _ => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Schedule for ThreadScheduler {
    fn enqueue(&self, task: Task) {
        if let Err(err) = self.try_enqueue(task) {
            tracing::warn!(error = %err, "dropping task submitted to a closed scheduler");
        }
    }
}
