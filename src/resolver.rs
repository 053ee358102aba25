//! Manual settlement of deferred values.
//!
//! A [`Resolver`] is the producing half of a [`Deferred`]. It can be moved to
//! any thread or task and settles its deferred value exactly once, either with
//! a value (or another deferred value, which is then followed) or with an
//! [`Error`]. Obtain a pair with [`defer`] or construct the value in place with
//! [`Deferred::new`].

use std::panic::{self, AssertUnwindSafe};

use futures::channel::oneshot::{self, Sender};

use crate::{
    deferred::{Deferred, IntoDeferred},
    error::Error,
};

type CancelCallback = Box<dyn FnOnce() + Send>;

/// The producing half of a [`Deferred`].
///
/// Dropping a `Resolver` without settling rejects its deferred value with
/// [`Error::Abandoned`].
pub struct Resolver<T> {
    sender: Option<Sender<Deferred<T>>>,
    on_cancel: Vec<CancelCallback>,
}

impl<T: Send + 'static> Resolver<T> {
    /// Fulfills the deferred value.
    ///
    /// If `value` is itself deferred, the deferred value adopts its eventual
    /// state, following any chain of deferred values until one settles.
    pub fn resolve(mut self, value: impl IntoDeferred<Value = T>) {
        self.settle(value.into_deferred());
    }

    /// Rejects the deferred value with `error`.
    pub fn reject(mut self, error: Error) {
        self.settle(Deferred::reject(error));
    }

    /// Registers a callback run if the consumer drops the deferred value before
    /// it was settled.
    ///
    /// The callback runs at the latest when this resolver is settled or dropped.
    /// Cancellation is not otherwise propagated by any combinator.
    pub fn on_cancel(&mut self, callback: impl FnOnce() + Send + 'static) -> &mut Self {
        self.on_cancel.push(Box::new(callback));
        self
    }

    /// Returns `true` if the consumer dropped the deferred value.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.sender.as_ref().is_none_or(Sender::is_canceled)
    }

    fn settle(&mut self, deferred: Deferred<T>) {
        if let Some(sender) = self.sender.take() {
            if sender.send(deferred).is_err() {
                self.run_cancel_callbacks();
            }
        }
    }
}

impl<T> Resolver<T> {
    fn run_cancel_callbacks(&mut self) {
        for callback in self.on_cancel.drain(..) {
            callback();
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            if sender.is_canceled() {
                self.run_cancel_callbacks();
            } else {
                tracing::debug!("resolver dropped without settling");
            }
        }
    }
}

/// Creates a deferred value together with the resolver that settles it.
///
/// # Example
/// ```
/// # futures::executor::block_on(async {
/// let (resolver, deferred) = deferred::defer();
/// std::thread::spawn(move || resolver.resolve(3u32));
/// assert_eq!(deferred.await.unwrap(), 3);
/// # });
/// ```
pub fn defer<T: Send + 'static>() -> (Resolver<T>, Deferred<T>) {
    let (sender, receiver) = oneshot::channel::<Deferred<T>>();
    let resolver = Resolver {
        sender: Some(sender),
        on_cancel: Vec::new(),
    };
    let deferred = Deferred::from_future(async move {
        // A dropped sender means the resolver went away unsettled.
        let followed = receiver.await.map_err(|_| Error::Abandoned)?;
        followed.await
    });
    (resolver, deferred)
}

impl<T: Send + 'static> Deferred<T> {
    /// Creates a deferred value settled by `executor`.
    ///
    /// `executor` runs synchronously, before this function returns, and receives
    /// the [`Resolver`]. It may settle right away or move the resolver elsewhere.
    /// A panic inside `executor` rejects the value with [`Error::Panicked`]
    /// unless it was already settled.
    pub fn new(executor: impl FnOnce(Resolver<T>)) -> Self {
        let (resolver, deferred) = defer();
        match panic::catch_unwind(AssertUnwindSafe(move || executor(resolver))) {
            Ok(()) => deferred,
            Err(payload) => {
                let error = Error::from_panic(payload);
                // An executor that settled before panicking keeps its outcome.
                Deferred::from_future(async move {
                    match deferred.await {
                        Err(Error::Abandoned) => Err(error),
                        outcome => outcome,
                    }
                })
            }
        }
    }

    /// Creates a deferred value together with the resolver that settles it.
    ///
    /// Same as the free function [`defer`].
    pub fn defer() -> (Resolver<T>, Self) {
        defer()
    }
}
