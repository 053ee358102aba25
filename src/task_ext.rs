use std::time::Duration;

use crate::{
    deferred::Deferred,
    error::Error,
    timing::{Delay, Expiry, Timeout},
};

/// Extend fallible futures with deferred-value and time-based operations.
pub trait DeferredExt<T>: Future<Output = Result<T, Error>> {
    /// Boxes the future into a [`Deferred`], making every combinator available.
    fn deferred(self) -> Deferred<T>
    where
        Self: Sized + Send + 'static,
        T: Send + 'static,
    {
        Deferred::from_future(self)
    }

    /// Holds back the fulfillment for `delay` after it arrives.
    fn delay(self, delay: Duration) -> Delay<Self, T>
    where
        Self: Sized,
    {
        Delay::new(self, delay)
    }

    /// Rejects with the default timeout error unless the future settles within
    /// `time_limit`.
    fn timeout(self, time_limit: Duration) -> Timeout<Self>
    where
        Self: Sized,
    {
        Timeout::new(self, time_limit, Expiry::default())
    }
}

impl<F, T> DeferredExt<T> for F where F: Future<Output = Result<T, Error>> {}
