//! Timing utilities for deferred values.
//!
//! Provides wrappers that add time-based behavior to futures resolving to
//! `Result<T, Error>`, together with the executor agnostic timer they are
//! built on. All timers are served by a single background driver thread that
//! keeps pending deadlines in a min-heap and wakes the owning task once its
//! deadline has passed. Dropping a timer before it fires removes it from the
//! driver.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    pin::Pin,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use futures::ready;
use pin_project_lite::pin_project;

use crate::error::{DEFAULT_TIMEOUT_MESSAGE, Error};

static DRIVER: OnceLock<Arc<Driver>> = OnceLock::new();
static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(0);

// Pending deadlines. `live` is the source of truth, heap entries whose id is
// no longer live are discarded when they reach the top.
#[derive(Default)]
struct Wheel {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    live: HashMap<u64, (Instant, Waker)>,
}

impl Wheel {
    fn register(&mut self, id: u64, deadline: Instant, waker: &Waker) {
        match self.live.get_mut(&id) {
            Some((_, current)) => {
                if !current.will_wake(waker) {
                    current.clone_from(waker);
                }
            }
            None => {
                self.live.insert(id, (deadline, waker.clone()));
                self.heap.push(Reverse((deadline, id)));
            }
        }
    }

    fn remove(&mut self, id: u64) {
        self.live.remove(&id);
    }

    fn peek_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id))) = self.heap.peek() {
            if self.live.contains_key(id) {
                return Some(*deadline);
            }
            self.heap.pop();
        }
        None
    }

    fn pop_due(&mut self, now: Instant) -> Vec<Waker> {
        let mut due = Vec::new();
        while let Some(deadline) = self.peek_deadline() {
            if deadline > now {
                break;
            }
            if let Some(Reverse((_, id))) = self.heap.pop() {
                if let Some((_, waker)) = self.live.remove(&id) {
                    due.push(waker);
                }
            }
        }
        due
    }
}

struct Driver {
    wheel: Mutex<Wheel>,
    changed: Condvar,
}

impl Driver {
    fn get() -> &'static Arc<Driver> {
        DRIVER.get_or_init(|| {
            let driver = Arc::new(Driver {
                wheel: Mutex::new(Wheel::default()),
                changed: Condvar::new(),
            });
            let worker = Arc::clone(&driver);
            std::thread::Builder::new()
                .name("deferred-timer".into())
                .spawn(move || worker.run())
                .expect("Timer driver creation failed");
            driver
        })
    }

    fn lock(&self) -> MutexGuard<'_, Wheel> {
        self.wheel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, id: u64, deadline: Instant, waker: &Waker) {
        self.lock().register(id, deadline, waker);
        self.changed.notify_one();
    }

    fn remove(&self, id: u64) {
        self.lock().remove(id);
    }

    fn run(&self) {
        let mut wheel = self.lock();
        loop {
            let now = Instant::now();
            let due = wheel.pop_due(now);
            if !due.is_empty() {
                drop(wheel);
                tracing::trace!(count = due.len(), "timers fired");
                for waker in due {
                    waker.wake();
                }
                wheel = self.lock();
                continue;
            }
            wheel = match wheel.peek_deadline() {
                Some(deadline) => {
                    self.changed
                        .wait_timeout(wheel, deadline.saturating_duration_since(now))
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .changed
                    .wait(wheel)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

/// A future that completes once a deadline has passed.
///
/// The deadline is fixed when the `Sleep` is created, not when it is first
/// polled. It is registered with the timer driver on the first pending poll
/// and deregistered when it completes or is dropped.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub struct Sleep {
    deadline: Instant,
    id: Option<u64>,
}

impl Sleep {
    /// Creates a timer that completes `duration` from now.
    pub fn new(duration: Duration) -> Self {
        Self::until(Instant::now() + duration)
    }

    /// Creates a timer that completes at `deadline`.
    pub fn until(deadline: Instant) -> Self {
        Sleep { deadline, id: None }
    }

    /// Returns the instant this timer completes at.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn deregister(&mut self) {
        if let Some(id) = self.id.take() {
            Driver::get().remove(id);
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if Instant::now() >= self.deadline {
            self.deregister();
            return Poll::Ready(());
        }
        let id = *self
            .id
            .get_or_insert_with(|| NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(timer = id, "timer registered");
        Driver::get().register(id, self.deadline, cx.waker());
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.deregister();
    }
}

pin_project! {
    /// A future that holds back the fulfillment of its inner future.
    ///
    /// The inner future is polled right away. Once it fulfills, the value is kept
    /// for the given duration before it is released, so the delay is counted from
    /// the moment the value became available. A rejection is passed through
    /// immediately.
    ///
    /// A more convenient way to construct this is via the
    /// [`delay()`](crate::task_ext::DeferredExt::delay) operator.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct Delay<F, T> {
        #[pin]
        future: F,
        delay: Duration,
        fulfilled: Option<T>,
        sleep: Option<Sleep>,
    }
}

impl<F, T> Delay<F, T> {
    /// Creates a new `Delay` that releases the fulfillment of `future` only
    /// after `delay` has passed since it arrived.
    pub fn new(future: F, delay: Duration) -> Self {
        Delay {
            future,
            delay,
            fulfilled: None,
            sleep: None,
        }
    }

    /// Consumes the `Delay` and returns the inner future.
    pub fn inner(self) -> F {
        self.future
    }
}

impl<F, T> Future for Delay<F, T>
where
    F: Future<Output = Result<T, Error>>,
{
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.sleep.is_none() {
            let value = ready!(this.future.poll(cx))?;
            *this.fulfilled = Some(value);
            *this.sleep = Some(Sleep::new(*this.delay));
        }
        if let Some(sleep) = this.sleep.as_mut() {
            ready!(Pin::new(sleep).poll(cx));
        }
        match this.fulfilled.take() {
            Some(value) => Poll::Ready(Ok(value)),
            None => Poll::Pending,
        }
    }
}

/// What a [`Timeout`] rejects with once its deadline wins.
#[derive(Clone, Debug)]
pub enum Expiry {
    /// Reject with [`Error::Timeout`] carrying this message.
    Message(String),

    /// Reject with this error, unchanged.
    Error(Error),
}

impl Expiry {
    /// Converts the expiry into the rejection it stands for.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Expiry::Message(message) => Error::timeout(message),
            Expiry::Error(error) => error,
        }
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::Message(DEFAULT_TIMEOUT_MESSAGE.to_string())
    }
}

impl From<&str> for Expiry {
    fn from(message: &str) -> Self {
        Expiry::Message(message.to_string())
    }
}

impl From<String> for Expiry {
    fn from(message: String) -> Self {
        Expiry::Message(message)
    }
}

impl From<Error> for Expiry {
    fn from(error: Error) -> Self {
        Expiry::Error(error)
    }
}

pin_project! {
    /// A future that races another future against a deadline.
    ///
    /// If the inner future does not settle within the time limit, the `Timeout`
    /// rejects with its [`Expiry`] and the inner future is never polled again. The
    /// countdown starts when the `Timeout` is created, ***not*** when it is
    /// awaited.
    ///
    /// For a more ergonomic way to create a timeout-wrapped future, consider using
    /// the [`timeout()`](crate::task_ext::DeferredExt::timeout) operator.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct Timeout<F> {
        #[pin]
        future: F,
        sleep: Sleep,
        expiry: Option<Expiry>,
    }
}

impl<F> Timeout<F> {
    /// Creates a new `Timeout` rejecting with `expiry` unless `future` settles
    /// within `time_limit`.
    pub fn new(future: F, time_limit: Duration, expiry: Expiry) -> Self {
        Timeout {
            future,
            sleep: Sleep::new(time_limit),
            expiry: Some(expiry),
        }
    }

    /// Consumes the `Timeout` and returns the inner future.
    pub fn inner(self) -> F {
        self.future
    }
}

impl<F, T> Future for Timeout<F>
where
    F: Future<Output = Result<T, Error>>,
{
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(outcome) = this.future.poll(cx) {
            this.sleep.deregister();
            return Poll::Ready(outcome);
        }
        ready!(Pin::new(this.sleep).poll(cx));
        tracing::debug!("deadline reached before the source settled");
        let expiry = this.expiry.take().unwrap_or_default();
        Poll::Ready(Err(expiry.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_fires_in_deadline_order() {
        let waker = futures::task::noop_waker();
        let now = Instant::now();
        let mut wheel = Wheel::default();
        wheel.register(1, now + Duration::from_millis(30), &waker);
        wheel.register(2, now + Duration::from_millis(10), &waker);
        wheel.register(3, now + Duration::from_millis(20), &waker);

        assert_eq!(wheel.peek_deadline(), Some(now + Duration::from_millis(10)));
        assert_eq!(wheel.pop_due(now + Duration::from_millis(20)).len(), 2);
        assert_eq!(wheel.peek_deadline(), Some(now + Duration::from_millis(30)));
    }

    #[test]
    fn removed_timers_never_fire() {
        let waker = futures::task::noop_waker();
        let now = Instant::now();
        let mut wheel = Wheel::default();
        wheel.register(1, now, &waker);
        wheel.register(2, now + Duration::from_millis(5), &waker);
        wheel.remove(1);

        assert_eq!(wheel.peek_deadline(), Some(now + Duration::from_millis(5)));
        assert!(wheel.pop_due(now).is_empty());
        wheel.remove(2);
        assert_eq!(wheel.peek_deadline(), None);
    }

    #[test]
    fn sleep_completes_after_deadline() {
        let start = Instant::now();
        futures::executor::block_on(Sleep::new(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn elapsed_sleep_is_ready_immediately() {
        let sleep = Sleep::until(Instant::now() - Duration::from_millis(1));
        futures::executor::block_on(sleep);
    }
}
