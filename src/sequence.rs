//! Ordered sequences consumed by the collection combinators.
//!
//! A [`Sequence`] is anything with an exact length whose elements can be taken
//! one position at a time. It is implemented for every [`IntoIterator`] whose
//! iterator is an [`ExactSizeIterator`] (vectors, arrays, `VecDeque`, ranges of
//! deferred values built with `map`, ...). Elements may be plain values or
//! deferred values; combinators await each element when they reach it.

use crate::{deferred::IntoDeferred, error::Error};

/// A finite, ordered collection with a length known up front.
pub trait Sequence: Send + 'static {
    /// The element type.
    type Item: IntoDeferred;

    /// Iterator yielding the elements in positional order.
    type Positions: Iterator<Item = Self::Item> + Send + 'static;

    /// Splits the sequence into its declared length and its elements.
    fn into_positions(self) -> (usize, Self::Positions);
}

impl<S> Sequence for S
where
    S: IntoIterator + Send + 'static,
    S::IntoIter: ExactSizeIterator + Send + 'static,
    S::Item: IntoDeferred,
{
    type Item = S::Item;
    type Positions = S::IntoIter;

    fn into_positions(self) -> (usize, Self::Positions) {
        let positions = self.into_iter();
        (positions.len(), positions)
    }
}

/// The fulfilled type of a sequence's elements.
pub type ValueOf<S> = <<S as Sequence>::Item as IntoDeferred>::Value;

// Walks a sequence position by position and checks that it really holds as
// many elements as it declared.
pub(crate) struct Cursor<S: Sequence> {
    positions: S::Positions,
    next: usize,
    len: usize,
}

impl<S: Sequence> Cursor<S> {
    pub(crate) fn new(sequence: S) -> Self {
        let (len, positions) = sequence.into_positions();
        Cursor {
            positions,
            next: 0,
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Claims the next unclaimed position.
    ///
    /// Returns `None` once every declared position was claimed.
    pub(crate) fn claim(&mut self) -> Option<Result<(usize, S::Item), Error>> {
        if self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(match self.positions.next() {
            Some(item) => Ok((index, item)),
            None => {
                self.next = self.len;
                Err(Error::InvalidArgument(format!(
                    "sequence ended at position {index} of declared length {}",
                    self.len
                )))
            }
        })
    }
}
