//! Concurrency-bounded mapping over sequences.
//!
//! [`map`] keeps up to a configurable number of worker chains in flight. A
//! chain claims the next unclaimed position, awaits its element, invokes the
//! worker and awaits the worker's result. As soon as one chain finishes,
//! another position is claimed, so the window stays full instead of advancing
//! in fixed rounds. Results are stored by position, so the output order always
//! matches the input order no matter which chain finishes first.

use std::{num::NonZeroUsize, sync::Arc};

use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    deferred::{Deferred, IntoDeferred},
    error::Error,
    sequence::{Cursor, Sequence, ValueOf},
};

/// Upper bound on simultaneously outstanding worker invocations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Concurrency {
    /// Start a chain for every position right away.
    #[default]
    Unbounded,

    /// Never have more than this many chains in flight.
    Bounded(NonZeroUsize),
}

impl Concurrency {
    fn window(self, len: usize) -> usize {
        match self {
            Concurrency::Unbounded => len,
            Concurrency::Bounded(limit) => limit.get().min(len),
        }
    }
}

impl From<usize> for Concurrency {
    /// `0` means unbounded.
    fn from(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Concurrency::Unbounded, Concurrency::Bounded)
    }
}

/// Options recognized by [`map`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MapOptions {
    concurrency: Concurrency,
}

impl MapOptions {
    /// Options with unbounded concurrency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency window. `0` means unbounded.
    #[must_use]
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.into();
        self
    }

    /// Returns the configured concurrency window.
    #[must_use]
    pub fn get_concurrency(&self) -> Concurrency {
        self.concurrency
    }
}

/// Maps every element with `worker`, keeping up to `options`' concurrency
/// window of invocations in flight.
///
/// `worker` receives the element and its index. The returned value fulfills
/// with the settled results in input order. The first rejection, from an
/// element or a worker, becomes the overall rejection; chains still in flight
/// at that moment are dropped and never polled again.
///
/// # Example
/// ```
/// use deferred::{Deferred, MapOptions};
///
/// # futures::executor::block_on(async {
/// let inputs = vec![Deferred::resolve(1i32), Deferred::resolve(2), Deferred::resolve(3)];
/// let mapped = deferred::map(inputs, |v: i32, _| v + 1, MapOptions::new().concurrency(2))
///     .await
///     .unwrap();
/// assert_eq!(mapped, vec![2, 3, 4]);
/// # });
/// ```
pub fn map<S, F, R>(sequence: S, worker: F, options: MapOptions) -> Deferred<Vec<R::Value>>
where
    S: Sequence,
    F: Fn(ValueOf<S>, usize) -> R + Send + Sync + 'static,
    R: IntoDeferred,
{
    let worker = Arc::new(worker);
    Deferred::from_future(async move {
        let mut cursor = Cursor::new(sequence);
        let len = cursor.len();
        let window = options.concurrency.window(len);

        let chain = |index: usize, item: S::Item| {
            let worker = Arc::clone(&worker);
            async move {
                let value = item.into_deferred().await?;
                let mapped = worker(value, index).into_deferred();
                Ok::<_, Error>((index, mapped.await?))
            }
        };

        let mut slots: Vec<Option<R::Value>> = std::iter::repeat_with(|| None).take(len).collect();
        let mut in_flight = FuturesUnordered::new();
        for _ in 0..window {
            let Some(claimed) = cursor.claim() else {
                break;
            };
            let (index, item) = claimed?;
            in_flight.push(chain(index, item));
        }
        tracing::trace!(len, window, "map window opened");

        while let Some(finished) = in_flight.next().await {
            let (index, value) = finished?;
            slots[index] = Some(value);
            if let Some(claimed) = cursor.claim() {
                let (index, item) = claimed?;
                in_flight.push(chain(index, item));
            }
        }

        collect_slots(slots)
    })
}

// Every position must have been filled exactly once.
fn collect_slots<U>(slots: Vec<Option<U>>) -> Result<Vec<U>, Error> {
    let len = slots.len();
    slots.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
        Error::InvalidArgument(format!("map finished with an unfilled position among {len}"))
    })
}

impl<S: Sequence> Deferred<S> {
    /// Waits for the sequence, then behaves like [`map`].
    pub fn map<F, R>(self, worker: F, options: MapOptions) -> Deferred<Vec<R::Value>>
    where
        F: Fn(ValueOf<S>, usize) -> R + Send + Sync + 'static,
        R: IntoDeferred,
    {
        self.then(move |sequence| map(sequence, worker, options))
    }
}
