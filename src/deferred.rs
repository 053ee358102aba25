//! Defines the `Deferred` value and the conversions that feed it.
//!
//! A `Deferred<T>` owns a boxed future resolving to `Result<T, Error>`. It
//! settles exactly once, either fulfilled with a `T` or rejected with an
//! [`Error`]. Every combinator consumes the value it is called on and returns a
//! new `Deferred`, so chains read top to bottom the same way they run.
//!
//! [`IntoDeferred`] is implemented by everything that can stand in for a
//! deferred value: another `Deferred` (which is followed until it settles),
//! a ready `Result`, and the plain standard value types. Workers handed to the
//! combinators may return any of these and their result is flattened.

use std::{
    collections::VecDeque,
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::{
    FutureExt,
    future::{self, BoxFuture},
};

use crate::{
    error::Error,
    timing::{Delay, Expiry, Timeout},
};

/// A value that is not known yet and settles exactly once.
///
/// Nothing beyond the synchronous part of its construction runs until the
/// `Deferred` is polled, typically by `.await`ing it or by handing it to an
/// executor.
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct Deferred<T> {
    future: BoxFuture<'static, Result<T, Error>>,
}

impl<T: Send + 'static> Deferred<T> {
    /// Wraps a future resolving to `Result<T, Error>`.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Deferred {
            future: future.boxed(),
        }
    }

    /// Creates a value that is already fulfilled with `value`.
    pub fn resolve(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    /// Creates a value that is already rejected with `error`.
    pub fn reject(error: Error) -> Self {
        Self::from_future(future::ready(Err(error)))
    }

    /// Creates a value rejected with a caller-supplied reason.
    pub fn reject_with(reason: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::reject(Error::reason(reason))
    }

    /// Continues with `f` once this value fulfills.
    ///
    /// Whatever `f` returns is followed until it settles, so returning another
    /// `Deferred` chains it in place. Rejections skip `f`.
    pub fn then<F, R>(self, f: F) -> Deferred<R::Value>
    where
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoDeferred,
    {
        Deferred::from_future(async move {
            let value = self.await?;
            f(value).into_deferred().await
        })
    }

    /// Recovers from a rejection with `f`. Fulfillments skip `f`.
    pub fn catch<F, R>(self, f: F) -> Deferred<T>
    where
        F: FnOnce(Error) -> R + Send + 'static,
        R: IntoDeferred<Value = T>,
    {
        Deferred::from_future(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) => f(error).into_deferred().await,
            }
        })
    }

    /// Runs a side effect on the fulfilled value and passes the value through.
    ///
    /// The side effect's own deferred result is awaited first. If it rejects,
    /// the returned value rejects with that reason; otherwise its outcome is
    /// discarded.
    pub fn tap<F, R>(self, side_effect: F) -> Deferred<T>
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: IntoDeferred,
    {
        Deferred::from_future(async move {
            let value = self.await?;
            let effect = side_effect(&value).into_deferred();
            effect.await?;
            Ok(value)
        })
    }

    /// Calls `f` with the elements of the fulfilled tuple as separate arguments.
    ///
    /// # Example
    /// ```
    /// # use deferred::Deferred;
    /// # futures::executor::block_on(async {
    /// let sum = Deferred::resolve((1, 2, 3))
    ///     .spread(|a: i32, b: i32, c: i32| a + b + c)
    ///     .await;
    /// assert_eq!(sum.unwrap(), 6);
    /// # });
    /// ```
    pub fn spread<F, R>(self, f: F) -> Deferred<R::Value>
    where
        T: Spread<F, R>,
        F: Send + 'static,
        R: IntoDeferred,
    {
        Deferred::from_future(async move {
            let args = self.await?;
            args.spread(f).into_deferred().await
        })
    }

    /// Holds back the fulfillment for `delay` after it arrives.
    ///
    /// The timer starts only once this value is available, so delaying a pending
    /// value waits for it first and then `delay` more. Rejections are not delayed.
    pub fn delay(self, delay: Duration) -> Deferred<T> {
        Deferred::from_future(Delay::<_, T>::new(self, delay))
    }

    /// Rejects with a timeout error unless this value settles within `time_limit`.
    ///
    /// The deadline is counted from this call. The error message is
    /// `"Request timed out"`; use [`timeout_with`](Self::timeout_with) to change it.
    pub fn timeout(self, time_limit: Duration) -> Deferred<T> {
        self.timeout_with(time_limit, Expiry::default())
    }

    /// Like [`timeout`](Self::timeout) but rejects with the given message or error.
    ///
    /// A message becomes an [`Error::Timeout`]; an [`Error`] is delivered unchanged.
    pub fn timeout_with(self, time_limit: Duration, expiry: impl Into<Expiry>) -> Deferred<T> {
        Deferred::from_future(Timeout::new(self, time_limit, expiry.into()))
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> From<Result<T, Error>> for Deferred<T> {
    fn from(outcome: Result<T, Error>) -> Self {
        outcome.into_deferred()
    }
}

/// Conversion into a [`Deferred`].
///
/// Anything a combinator awaits (sequence elements, worker results, initial
/// values) goes through this trait. A `Deferred` converts to itself and is
/// followed until it settles; a `Result` settles immediately; plain values
/// fulfill immediately.
///
/// Other futures can be lifted with [`Deferred::from_future`] or the
/// [`deferred()`](crate::task_ext::DeferredExt::deferred) operator. Custom value
/// types can be wrapped with [`Deferred::resolve`] or implement this trait
/// themselves.
///
/// The implementations cover a closed set of standard types, so a worker
/// returning a struct of its own wraps it in `Ok` (or [`Deferred::resolve`]):
///
/// ```
/// use deferred::{Error, MapOptions};
///
/// #[derive(Debug, PartialEq)]
/// struct Reading {
///     sensor: usize,
///     value: u32,
/// }
///
/// # futures::executor::block_on(async {
/// let readings = deferred::map(
///     vec![10u32, 20],
///     |value: u32, sensor| Ok::<_, Error>(Reading { sensor, value }),
///     MapOptions::new(),
/// )
/// .await
/// .unwrap();
/// assert_eq!(readings[1], Reading { sensor: 1, value: 20 });
/// # });
/// ```
pub trait IntoDeferred: Send + 'static {
    /// The type the deferred value fulfills with.
    type Value: Send + 'static;

    /// Converts `self` into a deferred value.
    fn into_deferred(self) -> Deferred<Self::Value>;
}

impl<T: Send + 'static> IntoDeferred for Deferred<T> {
    type Value = T;

    fn into_deferred(self) -> Deferred<T> {
        self
    }
}

impl<T: Send + 'static> IntoDeferred for Result<T, Error> {
    type Value = T;

    fn into_deferred(self) -> Deferred<T> {
        Deferred::from_future(future::ready(self))
    }
}

impl<T: Send + 'static> IntoDeferred for future::Ready<Result<T, Error>> {
    type Value = T;

    fn into_deferred(self) -> Deferred<T> {
        Deferred::from_future(self)
    }
}

macro_rules! fulfilled {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoDeferred for $ty {
                type Value = $ty;

                fn into_deferred(self) -> Deferred<$ty> {
                    Deferred::resolve(self)
                }
            }
        )*
    };
}

fulfilled!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
    Duration,
);

macro_rules! fulfilled_generic {
    ($($ty:ident),* $(,)?) => {
        $(
            impl<T: Send + 'static> IntoDeferred for $ty<T> {
                type Value = $ty<T>;

                fn into_deferred(self) -> Deferred<$ty<T>> {
                    Deferred::resolve(self)
                }
            }
        )*
    };
}

fulfilled_generic!(Vec, VecDeque, Option, Box);

impl<T: Send + Sync + 'static> IntoDeferred for Arc<T> {
    type Value = Arc<T>;

    fn into_deferred(self) -> Deferred<Arc<T>> {
        Deferred::resolve(self)
    }
}

/// Calls a function with the elements of a tuple as positional arguments.
///
/// Implemented for tuples of up to six elements.
pub trait Spread<F, R> {
    /// Invokes `f` with the elements of `self`.
    fn spread(self, f: F) -> R;
}

macro_rules! tuples {
    ($($name:ident),*) => {
        impl<$($name: Send + 'static),*> IntoDeferred for ($($name,)*) {
            type Value = ($($name,)*);

            fn into_deferred(self) -> Deferred<Self::Value> {
                Deferred::resolve(self)
            }
        }

        impl<Func, Ret, $($name),*> Spread<Func, Ret> for ($($name,)*)
        where
            Func: FnOnce($($name),*) -> Ret,
        {
            #[allow(non_snake_case)]
            fn spread(self, f: Func) -> Ret {
                let ($($name,)*) = self;
                f($($name),*)
            }
        }
    };
}

tuples!(A);
tuples!(A, B);
tuples!(A, B, C);
tuples!(A, B, C, D);
tuples!(A, B, C, D, E);
tuples!(A, B, C, D, E, G);

impl<Func, Ret> Spread<Func, Ret> for ()
where
    Func: FnOnce() -> Ret,
{
    fn spread(self, f: Func) -> Ret {
        f()
    }
}
