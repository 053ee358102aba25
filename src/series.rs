//! Strictly sequential iteration and reduction over sequences.
//!
//! Every combinator here visits positions in order and never starts work for
//! position `i + 1` before everything belonging to position `i` settled: the
//! element itself, the worker invocation and the worker's deferred result. The
//! first rejection ends the traversal and becomes the overall rejection.

use crate::{
    aggregate::all,
    deferred::{Deferred, IntoDeferred},
    sequence::{Cursor, Sequence, ValueOf},
};

/// Runs `worker` over every element for its side effects, in order.
///
/// `worker` receives the element, its index and the sequence length. Its result
/// is awaited before the next element is touched, but otherwise discarded: the
/// returned value fulfills with the original elements.
///
/// Unlike the [`map_series`] and [`map`](crate::map()) workers, this one only
/// borrows each element, which is what leaves the elements in place to be
/// returned.
///
/// # Example
/// ```
/// # futures::executor::block_on(async {
/// let mut seen = Vec::new();
/// let values = deferred::each(vec![1i32, 2, 3], move |v: &i32, _, _| seen.push(v * 2))
///     .await
///     .unwrap();
/// assert_eq!(values, vec![1, 2, 3]);
/// # });
/// ```
pub fn each<S, F, R>(sequence: S, mut worker: F) -> Deferred<Vec<ValueOf<S>>>
where
    S: Sequence,
    F: FnMut(&ValueOf<S>, usize, usize) -> R + Send + 'static,
    R: IntoDeferred,
{
    Deferred::from_future(async move {
        let mut cursor = Cursor::new(sequence);
        let len = cursor.len();
        let mut values = Vec::with_capacity(len);
        while let Some(claimed) = cursor.claim() {
            let (index, item) = claimed?;
            let value = item.into_deferred().await?;
            let step = worker(&value, index, len).into_deferred();
            step.await?;
            values.push(value);
        }
        Ok(values)
    })
}

/// Maps every element with `worker`, one at a time, in order.
///
/// Fulfills with the workers' settled results in input order.
pub fn map_series<S, F, R>(sequence: S, mut worker: F) -> Deferred<Vec<R::Value>>
where
    S: Sequence,
    F: FnMut(ValueOf<S>, usize, usize) -> R + Send + 'static,
    R: IntoDeferred,
{
    Deferred::from_future(async move {
        let mut cursor = Cursor::new(sequence);
        let len = cursor.len();
        let mut results = Vec::with_capacity(len);
        while let Some(claimed) = cursor.claim() {
            let (index, item) = claimed?;
            let value = item.into_deferred().await?;
            results.push(worker(value, index, len).into_deferred().await?);
        }
        Ok(results)
    })
}

/// Folds the sequence from left to right, starting from `initial`.
///
/// All elements are settled first. `worker` receives the accumulator, the
/// element, its index and the sequence length; its deferred result becomes the
/// next accumulator once settled. An empty sequence fulfills with `initial`.
pub fn reduce<S, F, R, A, I>(sequence: S, mut worker: F, initial: I) -> Deferred<A>
where
    S: Sequence,
    F: FnMut(A, ValueOf<S>, usize, usize) -> R + Send + 'static,
    R: IntoDeferred<Value = A>,
    A: Send + 'static,
    I: IntoDeferred<Value = A>,
{
    Deferred::from_future(async move {
        let values = all(sequence).await?;
        let len = values.len();
        let mut accumulator = initial.into_deferred().await?;
        for (index, value) in values.into_iter().enumerate() {
            accumulator = worker(accumulator, value, index, len)
                .into_deferred()
                .await?;
        }
        Ok(accumulator)
    })
}

/// Folds the sequence using its first element as the seed.
///
/// Fulfills with `None` for an empty sequence and with the only element, without
/// calling `worker`, for a sequence of one. Otherwise folding starts at index 1.
pub fn reduce_first<S, F, R>(sequence: S, mut worker: F) -> Deferred<Option<ValueOf<S>>>
where
    S: Sequence,
    F: FnMut(ValueOf<S>, ValueOf<S>, usize, usize) -> R + Send + 'static,
    R: IntoDeferred<Value = ValueOf<S>>,
{
    Deferred::from_future(async move {
        let values = all(sequence).await?;
        let len = values.len();
        let mut values = values.into_iter().enumerate();
        let Some((_, mut accumulator)) = values.next() else {
            return Ok(None);
        };
        for (index, value) in values {
            accumulator = worker(accumulator, value, index, len)
                .into_deferred()
                .await?;
        }
        Ok(Some(accumulator))
    })
}

impl<S: Sequence> Deferred<S> {
    /// Waits for the sequence, then behaves like [`each`].
    pub fn each<F, R>(self, worker: F) -> Deferred<Vec<ValueOf<S>>>
    where
        F: FnMut(&ValueOf<S>, usize, usize) -> R + Send + 'static,
        R: IntoDeferred,
    {
        self.then(move |sequence| each(sequence, worker))
    }

    /// Waits for the sequence, then behaves like [`map_series`].
    pub fn map_series<F, R>(self, worker: F) -> Deferred<Vec<R::Value>>
    where
        F: FnMut(ValueOf<S>, usize, usize) -> R + Send + 'static,
        R: IntoDeferred,
    {
        self.then(move |sequence| map_series(sequence, worker))
    }

    /// Waits for the sequence, then behaves like [`reduce`].
    pub fn reduce<F, R, A, I>(self, worker: F, initial: I) -> Deferred<A>
    where
        F: FnMut(A, ValueOf<S>, usize, usize) -> R + Send + 'static,
        R: IntoDeferred<Value = A>,
        A: Send + 'static,
        I: IntoDeferred<Value = A>,
    {
        self.then(move |sequence| reduce(sequence, worker, initial))
    }

    /// Waits for the sequence, then behaves like [`reduce_first`].
    pub fn reduce_first<F, R>(self, worker: F) -> Deferred<Option<ValueOf<S>>>
    where
        F: FnMut(ValueOf<S>, ValueOf<S>, usize, usize) -> R + Send + 'static,
        R: IntoDeferred<Value = ValueOf<S>>,
    {
        self.then(move |sequence| reduce_first(sequence, worker))
    }
}
