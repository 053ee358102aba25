//! Executor agnostic deferred values and the combinators built on them.
//!
//! `deferred` provides a [`Deferred`] value, a boxed, `Send` future that
//! settles exactly once with a value or an [`Error`], together with a set of
//! combinators for working with ordered collections of such values.
//!
//! The crate is designed to work independently of any specific async runtime.
//! Timers are served by a small background driver thread and callbacks are
//! posted to a pluggable [`Host`], so chains can be awaited on tokio, smol or
//! a plain `futures` executor alike.
//!
//! Features include:
//! - Strictly sequential iteration and reduction with [`each`], [`map_series`],
//!   [`reduce`] and [`reduce_first`]
//! - Concurrency-bounded mapping with [`map`] that keeps its window full and
//!   preserves input order in the result
//! - Deadlines and delays via [`Deferred::timeout`] and [`Deferred::delay`]
//! - Capture of panics and nested deferred results with [`attempt`] and
//!   [`Method`]
//! - Manual settlement through a [`Resolver`]
//! - A bridge to `(error, value)` callbacks with [`Deferred::as_callback`]
//! - Aggregates [`all`], [`race`] and [`any`]
//!
//! Workers passed to the combinators may return plain values, `Result`s or
//! other deferred values; every result is followed until it settles.

pub mod aggregate;
pub mod callback;
pub mod capture;
pub mod deferred;
pub mod error;
pub mod map;
pub mod resolver;
pub mod sequence;
pub mod series;
pub mod task_ext;
pub mod timing;

pub use aggregate::{all, any, delay, race};
pub use callback::Host;
pub use capture::{Method, attempt, method};
pub use deferred::{Deferred, IntoDeferred, Spread};
pub use error::{Error, Reason};
pub use map::{Concurrency, MapOptions, map};
pub use resolver::{Resolver, defer};
pub use sequence::{Sequence, ValueOf};
pub use series::{each, map_series, reduce, reduce_first};
pub use task_ext::DeferredExt;
pub use timing::{Delay, Expiry, Sleep, Timeout};
