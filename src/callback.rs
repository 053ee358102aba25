//! Bridge from deferred values to `(error, value)` callbacks.
//!
//! The bridge never invokes a callback synchronously. The source keeps running
//! on whatever executor awaits the returned value, so sources bound to a
//! runtime (timers, IO, spawned tasks) behave exactly as without the bridge.
//! Once the source settles, only the callback invocation is posted to a
//! [`Host`] as a task of its own. A panic inside the callback therefore unwinds
//! in that task, where the host's failure reporting sees it, and never reaches
//! the deferred value returned by the bridge.

use std::{panic::AssertUnwindSafe, sync::OnceLock};

use futures::{
    FutureExt,
    executor::{ThreadPool, ThreadPoolBuilder},
    future::BoxFuture,
};

use crate::{deferred::Deferred, error::Error};

/// Number of threads in the pool used by [`Deferred::as_callback`].
pub const DEFAULT_POOL_SIZE: usize = 4;

static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Runs posted tasks after the current synchronous turn.
///
/// Implemented for [`ThreadPool`]. Wrap any other runtime's spawner to use it
/// with [`Deferred::as_callback_on`].
pub trait Host: Clone + Send + Sync + 'static {
    /// Schedules `task` to run to completion.
    fn post(&self, task: BoxFuture<'static, ()>);
}

impl Host for ThreadPool {
    /// A panicking task is reported twice: by the process panic hook when it
    /// unwinds, and through `tracing` at error level once caught at the task
    /// boundary. Catching it keeps the worker thread alive.
    fn post(&self, task: BoxFuture<'static, ()>) {
        self.spawn_ok(async move {
            if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                tracing::error!(panic = %Error::from_panic(payload), "posted task panicked");
            }
        });
    }
}

fn default_host() -> &'static ThreadPool {
    THREAD_POOL.get_or_init(|| {
        ThreadPoolBuilder::new()
            .pool_size(DEFAULT_POOL_SIZE)
            .name_prefix("deferred-callback-")
            .create()
            .expect("Thread pool creation failed")
    })
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Reports the outcome to `callback` on the default thread pool.
    ///
    /// See [`as_callback_on`](Self::as_callback_on).
    pub fn as_callback<F>(self, callback: F) -> Deferred<T>
    where
        F: FnOnce(Option<Error>, Option<T>) + Send + 'static,
    {
        self.as_callback_on(default_host(), callback)
    }

    /// Reports the outcome to `callback`, posted as a task on `host`.
    ///
    /// The source is driven by the executor awaiting the returned value; the
    /// callback is posted once the source settled, so a returned value that is
    /// never polled never reports. A fulfillment is reported as
    /// `callback(None, Some(value))` and a rejection as
    /// `callback(Some(error), None)`; the error is handed over as is, so an
    /// [`Error::Empty`] rejection still arrives as an error whose
    /// [`cause()`](Error::cause) is `None`.
    ///
    /// The returned value settles with the same outcome as the source.
    pub fn as_callback_on<H, F>(self, host: &H, callback: F) -> Deferred<T>
    where
        H: Host,
        F: FnOnce(Option<Error>, Option<T>) + Send + 'static,
    {
        self.bridge(host, move |outcome| match outcome {
            Ok(value) => callback(None, Some(value)),
            Err(error) => callback(Some(error), None),
        })
    }

    /// Like [`as_callback_on`](Self::as_callback_on), but hands the elements of
    /// a fulfilled collection to `callback` as one argument list.
    ///
    /// A rejection is reported with an empty list.
    pub fn as_callback_spread_on<H, F>(self, host: &H, callback: F) -> Deferred<T>
    where
        T: IntoIterator,
        H: Host,
        F: FnOnce(Option<Error>, Vec<T::Item>) + Send + 'static,
    {
        self.bridge(host, move |outcome| match outcome {
            Ok(value) => callback(None, value.into_iter().collect()),
            Err(error) => callback(Some(error), Vec::new()),
        })
    }

    /// Like [`as_callback_spread_on`](Self::as_callback_spread_on) on the
    /// default thread pool.
    pub fn as_callback_spread<F>(self, callback: F) -> Deferred<T>
    where
        T: IntoIterator,
        F: FnOnce(Option<Error>, Vec<T::Item>) + Send + 'static,
    {
        self.as_callback_spread_on(default_host(), callback)
    }

    fn bridge<H, D>(self, host: &H, deliver: D) -> Deferred<T>
    where
        H: Host,
        D: FnOnce(Result<T, Error>) + Send + 'static,
    {
        let host = host.clone();
        Deferred::from_future(async move {
            let outcome = self.await;
            let reported = outcome.clone();
            tracing::debug!(fulfilled = outcome.is_ok(), "posting callback");
            host.post(async move { deliver(reported) }.boxed());
            outcome
        })
    }
}
