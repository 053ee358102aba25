//! Combinators that settle a whole sequence at once.
//!
//! Unlike the sequential combinators, these claim every position up front and
//! poll all elements concurrently within one future.

use std::time::Duration;

use futures::{
    StreamExt,
    future::{self, try_join_all},
    stream::FuturesUnordered,
};

use crate::{
    deferred::{Deferred, IntoDeferred},
    error::Error,
    sequence::{Cursor, Sequence, ValueOf},
};

fn claim_all<S: Sequence>(sequence: S) -> Result<Vec<Deferred<ValueOf<S>>>, Error> {
    let mut cursor = Cursor::new(sequence);
    let mut claimed = Vec::with_capacity(cursor.len());
    while let Some(position) = cursor.claim() {
        let (_, item) = position?;
        claimed.push(item.into_deferred());
    }
    Ok(claimed)
}

/// Waits for every element and fulfills with their values in input order.
///
/// The first rejection becomes the overall rejection.
pub fn all<S: Sequence>(sequence: S) -> Deferred<Vec<ValueOf<S>>> {
    Deferred::from_future(async move { try_join_all(claim_all(sequence)?).await })
}

/// Settles with the outcome of whichever element settles first.
///
/// An empty sequence never settles.
pub fn race<S: Sequence>(sequence: S) -> Deferred<ValueOf<S>> {
    Deferred::from_future(async move {
        let candidates = claim_all(sequence)?;
        if candidates.is_empty() {
            return future::pending().await;
        }
        let (outcome, index, _) = future::select_all(candidates).await;
        tracing::trace!(index, "race settled");
        outcome
    })
}

/// Fulfills with the first element to fulfill.
///
/// If every element rejects, rejects with [`Error::Aggregate`] holding the
/// rejections in input order. An empty sequence rejects with an empty
/// aggregate.
pub fn any<S: Sequence>(sequence: S) -> Deferred<ValueOf<S>> {
    Deferred::from_future(async move {
        let candidates = claim_all(sequence)?;
        let mut errors = vec![None; candidates.len()];
        let mut pending: FuturesUnordered<_> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| async move { (index, candidate.await) })
            .collect();
        while let Some((index, outcome)) = pending.next().await {
            match outcome {
                Ok(value) => return Ok(value),
                Err(error) => errors[index] = Some(error),
            }
        }
        Err(Error::Aggregate(errors.into_iter().flatten().collect()))
    })
}

/// Fulfills with `value` once `duration` has passed since it became available.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// # futures::executor::block_on(async {
/// let late = deferred::delay(Duration::from_millis(10), "late").await;
/// assert_eq!(late.unwrap(), "late");
/// # });
/// ```
pub fn delay<V: IntoDeferred>(duration: Duration, value: V) -> Deferred<V::Value> {
    value.into_deferred().delay(duration)
}

impl<S: Sequence> Deferred<S> {
    /// Waits for the sequence, then behaves like [`all`].
    pub fn all(self) -> Deferred<Vec<ValueOf<S>>> {
        self.then(all)
    }

    /// Waits for the sequence, then behaves like [`race`].
    pub fn race(self) -> Deferred<ValueOf<S>> {
        self.then(race)
    }

    /// Waits for the sequence, then behaves like [`any`].
    pub fn any(self) -> Deferred<ValueOf<S>> {
        self.then(any)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn all_keeps_input_order() {
        let values = block_on(all(vec![Deferred::resolve(1u8), Deferred::resolve(2u8)]));
        assert_eq!(values.unwrap(), vec![1, 2]);
    }

    #[test]
    fn any_collects_rejections_in_order() {
        let outcome = block_on(any(vec![
            Deferred::<u8>::reject(Error::timeout("first")),
            Deferred::<u8>::reject(Error::Empty),
        ]));
        let Err(Error::Aggregate(errors)) = outcome else {
            panic!("expected an aggregate rejection");
        };
        assert!(errors[0].is_timeout());
        assert!(matches!(errors[1], Error::Empty));
    }

    #[test]
    fn any_of_nothing_is_an_empty_aggregate() {
        let outcome = block_on(any(Vec::<u8>::new()));
        assert!(matches!(outcome, Err(Error::Aggregate(ref errors)) if errors.is_empty()));
    }
}
