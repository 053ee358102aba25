//! Capture of synchronous failures.
//!
//! [`attempt`] and [`Method`] run caller code right away, on the calling
//! thread, and turn whatever happens into a deferred value: a panic becomes a
//! rejection with [`Error::Panicked`], a returned `Err` becomes a rejection with
//! exactly that error and a returned deferred value is followed until it
//! settles.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    deferred::{Deferred, IntoDeferred, Spread},
    error::Error,
};

/// Invokes `f` immediately and captures its outcome as a deferred value.
///
/// # Example
/// ```
/// use deferred::Error;
///
/// # futures::executor::block_on(async {
/// let failed = deferred::attempt(|| -> Result<u8, Error> { panic!("boom") });
/// assert!(matches!(failed.await, Err(Error::Panicked(_))));
///
/// let nested = deferred::attempt(|| deferred::Deferred::resolve(3u8));
/// assert_eq!(nested.await.unwrap(), 3);
/// # });
/// ```
pub fn attempt<F, R>(f: F) -> Deferred<R::Value>
where
    F: FnOnce() -> R,
    R: IntoDeferred,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome.into_deferred(),
        Err(payload) => Deferred::reject(Error::from_panic(payload)),
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// Invokes `f` immediately and captures its outcome. See [`attempt`].
    pub fn attempt<F, R>(f: F) -> Self
    where
        F: FnOnce() -> R,
        R: IntoDeferred<Value = T>,
    {
        attempt(f)
    }
}

/// A function wrapped so that every call returns a deferred value.
///
/// Arguments are passed as a tuple and spread into the wrapped function, so a
/// call with `()` invokes it with no arguments at all. Each call behaves like
/// [`attempt`].
///
/// # Example
/// ```
/// use deferred::Method;
///
/// # futures::executor::block_on(async {
/// let add = Method::new(|a: u32, b: u32| a + b);
/// assert_eq!(add.call((1u32, 2u32)).await.unwrap(), 3);
/// # });
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Method<F> {
    f: F,
}

impl<F> Method<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Method { f }
    }

    /// Calls the wrapped function with `args` spread as its arguments.
    pub fn call<'s, A, R>(&'s self, args: A) -> Deferred<R::Value>
    where
        A: Spread<&'s F, R>,
        R: IntoDeferred,
    {
        attempt(|| args.spread(&self.f))
    }

    /// Consumes the wrapper and returns the function.
    pub fn into_inner(self) -> F {
        self.f
    }
}

/// Wraps `f` so that every call returns a deferred value. See [`Method`].
pub fn method<F>(f: F) -> Method<F> {
    Method::new(f)
}
