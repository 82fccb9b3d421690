//! `all` and `hash`: many containers in, one container out.
//!
use crate::{FailureKind, Promise, Scheduler, Value};
use std::{
    collections::BTreeMap,
    mem,
    sync::{Arc, Mutex, PoisonError},
};

/// Per-slot results shared by every slot callback of one aggregate.
struct Aggregate<K> {
    values: BTreeMap<K, Value>,
    remaining: usize,
}

impl<K: Ord> Aggregate<K> {
    /// Records one slot. Returns every value once the last slot is in.
    fn complete(&mut self, key: K, value: Value) -> Option<BTreeMap<K, Value>> {
        self.values.insert(key, value);
        self.remaining = self.remaining.saturating_sub(1);
        (self.remaining == 0).then(|| mem::take(&mut self.values))
    }
}

fn aggregate<K>(
    scheduler: &Scheduler,
    slots: Vec<(K, Value)>,
    finish: fn(BTreeMap<K, Value>) -> Value,
) -> Promise
where
    K: Ord + Send + 'static,
{
    let deferred = Promise::defer(scheduler);
    if slots.is_empty() {
        deferred.resolve(finish(BTreeMap::new()));
        return deferred.promise;
    }
    let shared = Arc::new(Mutex::new(Aggregate {
        values: BTreeMap::new(),
        remaining: slots.len(),
    }));
    for (key, item) in slots {
        let on_fulfilled = {
            let (shared, resolve) = (shared.clone(), deferred.resolve.clone());
            move |value: Value| -> Result<Value, Value> {
                let done = shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .complete(key, value);
                if let Some(values) = done {
                    resolve.resolve(finish(values));
                }
                Ok(Value::Undefined)
            }
        };
        let on_rejected = {
            let (reject, aggregate) = (deferred.reject.clone(), deferred.promise.id());
            move |reason: Value| -> Result<Value, Value> {
                tracing::debug!(aggregate, kind = %FailureKind::Aggregate, reason = ?reason, "slot rejected");
                reject.reject(reason);
                Ok(Value::Undefined)
            }
        };
        Promise::resolve(scheduler, item).then_catch(on_fulfilled, on_rejected);
    }
    deferred.promise
}

impl Promise {
    /// Fulfills with a list of every item's value, in input order, once all
    /// of them have fulfilled. Rejects with the first rejection reason.
    ///
    /// Items may be containers, foreign thenables or plain values.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_plus::{Promise, RunLoop, Value};
    ///
    /// let run_loop = RunLoop::new();
    /// let scheduler = run_loop.scheduler();
    /// let all = Promise::all(&scheduler, [Value::from(Promise::resolve(&scheduler, 1)), Value::from(2)]);
    /// run_loop.run_until_idle();
    /// assert_eq!(
    ///     all.settlement().unwrap().into_result(),
    ///     Ok(Value::from(vec![Value::from(1), Value::from(2)]))
    /// );
    /// ```
    pub fn all<I>(scheduler: &Scheduler, items: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let slots = items
            .into_iter()
            .map(Into::into)
            .enumerate()
            .collect::<Vec<(usize, Value)>>();
        aggregate(scheduler, slots, |values| {
            Value::List(values.into_values().collect())
        })
    }

    /// Like [`Promise::all`], keyed by name. Fulfills with a map holding every
    /// key's value.
    ///
    /// Slots are followed in input order, so among already rejected entries
    /// the first one given decides the reason. A repeated key keeps its first
    /// position and its last value.
    pub fn hash<I, K, V>(scheduler: &Scheduler, entries: I) -> Promise
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut slots: Vec<(String, Value)> = vec![];
        let mut positions = BTreeMap::new();
        for (key, value) in entries {
            let (key, value) = (key.into(), value.into());
            match positions.get(&key) {
                Some(&at) => slots[at] = (key, value),
                None => {
                    positions.insert(key.clone(), slots.len());
                    slots.push((key, value));
                }
            }
        }
        aggregate(scheduler, slots, Value::Map)
    }
}
