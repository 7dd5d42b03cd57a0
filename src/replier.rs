//! Replier registry.
//!
//! Maps query names to handlers. A handler receives the positional
//! parameter list of a query and produces either a ready value or a
//! deferred one.
//!
//! The registry is an immutable, cheaply cloned snapshot. Strategies keep
//! the snapshot they were given in `init`; registering more handlers on the
//! owner's copy does not affect them until the owner calls `init` again.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a replier hands back.
pub enum Reply {
    /// The result is already known.
    Ready(Value),
    /// The handler returned its own deferred result.
    Deferred(BoxFuture<'static, Result<Value>>),
}

impl Reply {
    /// Wait for the value, whichever form it is in.
    pub async fn resolve(self) -> Result<Value> {
        // ---
        match self {
            Reply::Ready(value) => Ok(value),
            Reply::Deferred(fut) => fut.await,
        }
    }

    /// The value if it is already known.
    pub fn ready(self) -> Option<Value> {
        match self {
            Reply::Ready(value) => Some(value),
            Reply::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Reply::Deferred(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A type-erased query handler.
pub trait Replier: Send + Sync {
    /// Invoke the handler with the query's positional parameters.
    fn call(&self, params: Vec<Value>) -> Result<Reply>;
}

/// Decode a positional parameter list into `P`.
///
/// The inverse of [`encode_params`]. The whole list is tried first, so
/// tuples and sequences decode as sent. Only when that fails does an empty
/// list decode as `null` (for `()` and `None`) and a one-element list as
/// that element alone.
pub fn decode_params<P: DeserializeOwned>(params: Vec<Value>) -> Result<P> {
    // ---
    let as_list = match serde_json::from_value(Value::Array(params.clone())) {
        Ok(p) => return Ok(p),
        Err(err) => err,
    };

    let fallback = match params.len() {
        0 => serde_json::from_value(Value::Null),
        1 => serde_json::from_value(params.into_iter().next().unwrap_or(Value::Null)),
        _ => return Err(as_list.into()),
    };

    fallback.map_err(|_| as_list.into())
}

/// Encode `params` as a positional parameter list.
///
/// Sequences become the list itself, `null` (including `()`) becomes an
/// empty list, and any other value becomes a single-element list.
pub fn encode_params<P: Serialize>(params: &P) -> Result<Vec<Value>> {
    // ---
    Ok(match serde_json::to_value(params)? {
        Value::Array(list) => list,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

// Synchronous typed handler.
struct FnReplier<F, P, R> {
    func: F,
    _phantom: PhantomData<fn(P) -> R>,
}

impl<F, P, R> Replier for FnReplier<F, P, R>
where
    F: Fn(P) -> Result<R> + Send + Sync,
    P: DeserializeOwned,
    R: Serialize,
{
    fn call(&self, params: Vec<Value>) -> Result<Reply> {
        let p = decode_params(params)?;
        let r = (self.func)(p)?;
        Ok(Reply::Ready(serde_json::to_value(r)?))
    }
}

// Asynchronous typed handler.
struct AsyncReplier<F, Fut, P, R> {
    func: F,
    _phantom: PhantomData<fn(P, Fut) -> R>,
}

impl<F, Fut, P, R> Replier for AsyncReplier<F, Fut, P, R>
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
    P: DeserializeOwned,
    R: Serialize + 'static,
{
    fn call(&self, params: Vec<Value>) -> Result<Reply> {
        // ---
        let p = decode_params(params)?;
        let fut = (self.func)(p);

        Ok(Reply::Deferred(Box::pin(async move {
            let r = fut.await?;
            Ok(serde_json::to_value(r)?)
        })))
    }
}

// Untyped handler working on raw values.
struct RawReplier<F>(F);

impl<F> Replier for RawReplier<F>
where
    F: Fn(Vec<Value>) -> Result<Reply> + Send + Sync,
{
    fn call(&self, params: Vec<Value>) -> Result<Reply> {
        (self.0)(params)
    }
}

/// Query name to handler mapping.
#[derive(Clone, Default)]
pub struct ReplierRegistry {
    // ---
    handlers: Arc<HashMap<String, Arc<dyn Replier>>>,
}

impl ReplierRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous handler; replaces any handler with that name.
    ///
    /// ```
    /// # use eventcast::ReplierRegistry;
    /// let mut repliers = ReplierRegistry::new();
    /// repliers.register_fn("sum", |(a, b): (i64, i64)| Ok(a + b));
    /// assert!(repliers.contains("sum"));
    /// ```
    pub fn register_fn<F, P, R>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(P) -> Result<R> + Send + Sync + 'static,
        P: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        self.insert(
            name,
            Arc::new(FnReplier {
                func,
                _phantom: PhantomData,
            }),
        )
    }

    /// Register a handler returning a future.
    pub fn register_async<F, Fut, P, R>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        P: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        self.insert(
            name,
            Arc::new(AsyncReplier {
                func,
                _phantom: PhantomData,
            }),
        )
    }

    /// Register a handler over raw positional values.
    pub fn register_raw<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Result<Reply> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(RawReplier(func)))
    }

    /// Register an already type-erased handler.
    pub fn insert(&mut self, name: impl Into<String>, replier: Arc<dyn Replier>) -> &mut Self {
        // ---
        // Copy-on-write: snapshots already handed out keep the old map.
        Arc::make_mut(&mut self.handlers).insert(name.into(), replier);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Replier>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered query names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for ReplierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
