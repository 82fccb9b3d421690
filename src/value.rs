//! The dynamic value carried by containers: fulfillment values, rejection
//! reasons and callback arguments are all [`Value`]s.
//!
//! Native containers, foreign thenables and plain data can sit side by side
//! in one `Value`, which is what lets `all`/`hash` take mixed collections and
//! lets a container be fulfilled with itself.
//!
use crate::Promise;
use std::{collections::BTreeMap, fmt, sync::Arc};

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Promise(Promise),
    Function(Function),
    Object(Arc<dyn Object>),
}

/// A method looked up on an [`Object`]. It is invoked with the object itself
/// as the receiver.
pub type Method = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync>;

/// A foreign structured value.
///
/// The only member the crate ever reads is `then`. Implementations decide
/// what reading it means: absent, present but not callable, callable, or a
/// read that fails.
pub trait Object: fmt::Debug + Send + Sync {
    /// Reads the `then` member. `Ok(None)` means there is no callable `then`.
    fn then_member(&self) -> Result<Option<Method>, Value>;
}

/// A callable value.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(&[Value]) -> Result<Value, Value> + Send + Sync>);

impl Function {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        (self.0)(args)
    }

    /// Calls with a single argument.
    pub fn call1(&self, arg: impl Into<Value>) -> Result<Value, Value> {
        self.call(&[arg.into()])
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Object whose `then` member forwards to a closure. Built by
/// [`Value::thenable`].
struct ThenFn<F>(Arc<F>);

impl<F> fmt::Debug for ThenFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thenable")
    }
}

impl<F> Object for ThenFn<F>
where
    F: Fn(Function, Function) -> Result<(), Value> + Send + Sync + 'static,
{
    fn then_member(&self) -> Result<Option<Method>, Value> {
        let then = self.0.clone();
        Ok(Some(Arc::new(move |_this: &Value, args: &[Value]| -> Result<Value, Value> {
            then(nth_function(args, 0), nth_function(args, 1))?;
            Ok(Value::Undefined)
        })))
    }
}

fn nth_function(args: &[Value], n: usize) -> Function {
    match args.get(n) {
        Some(Value::Function(f)) => f.clone(),
        _ => Function::new(|_| Ok(Value::Undefined)),
    }
}

impl Value {
    /// A foreign thenable whose `then(resolve, reject)` runs `then`.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_plus::{Promise, RunLoop, Value};
    ///
    /// let run_loop = RunLoop::new();
    /// let thenable = Value::thenable(|resolve, _reject| {
    ///     resolve.call1("from a thenable")?;
    ///     Ok(())
    /// });
    /// let promise = Promise::resolve(&run_loop.scheduler(), thenable);
    /// run_loop.run_until_idle();
    /// assert_eq!(promise.settlement().unwrap().into_result(), Ok(Value::from("from a thenable")));
    /// ```
    pub fn thenable(
        then: impl Fn(Function, Function) -> Result<(), Value> + Send + Sync + 'static,
    ) -> Value {
        Value::Object(Arc::new(ThenFn(Arc::new(then))))
    }

    pub fn object(object: impl Object + 'static) -> Value {
        Value::Object(Arc::new(object))
    }

    pub fn function(f: impl Fn(&[Value]) -> Result<Value, Value> + Send + Sync + 'static) -> Value {
        Value::Function(Function::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Promise(_) => "promise",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    /// Referential identity for containers, functions and objects; equality
    /// for plain data.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Value::Promise(_) | Value::Function(_) | Value::Object(_), _)
            | (_, Value::Promise(_) | Value::Function(_) | Value::Object(_)) => false,
            (a, b) => a == b,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Promise(_), _) | (Value::Function(_), _) | (Value::Object(_), _) => {
                self.same(other)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f.debug_map().entries(entries).finish(),
            Value::Promise(p) => write!(f, "Promise(#{})", p.id()),
            Value::Function(func) => func.fmt(f),
            Value::Object(object) => object.fmt(f),
        }
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

// Numbers are f64: integers beyond 2^53 in magnitude round to the nearest
// representable value.
from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}
