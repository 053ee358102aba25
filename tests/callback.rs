use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use deferred::{Deferred, DeferredExt, Error, Host};
use futures::{channel::oneshot, future::BoxFuture};
use tokio::{
    runtime::Handle,
    task::{JoinError, JoinHandle},
};

#[derive(Debug, thiserror::Error)]
#[error("legacy failure")]
struct LegacyFailure;

// Posts to the current tokio runtime and keeps the handles so tests can
// observe what happened inside posted tasks.
#[derive(Clone)]
struct TokioHost {
    handle: Handle,
    posted: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TokioHost {
    fn current() -> Self {
        TokioHost {
            handle: Handle::current(),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn take_posted(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.posted.lock().unwrap())
    }

    // Awaits posted tasks, including the ones they post, in posting order.
    async fn drain(&self) -> Vec<Result<(), JoinError>> {
        let mut finished = Vec::new();
        loop {
            let posted = self.take_posted();
            if posted.is_empty() {
                return finished;
            }
            for handle in posted {
                finished.push(handle.await);
            }
        }
    }
}

impl Host for TokioHost {
    fn post(&self, task: BoxFuture<'static, ()>) {
        let handle = self.handle.spawn(task);
        self.posted.lock().unwrap().push(handle);
    }
}

type Report<T> = (Option<Error>, Option<T>);

#[tokio::test(flavor = "multi_thread")]
async fn fulfillment_is_reported_without_error() {
    let (sender, receiver) = oneshot::channel::<Report<u32>>();
    let value = Deferred::resolve(5u32)
        .as_callback(move |error, value| {
            let _ = sender.send((error, value));
        })
        .await
        .unwrap();
    assert_eq!(value, 5, "Chained value should be unchanged");

    let (error, value) = receiver.await.unwrap();
    assert!(error.is_none());
    assert_eq!(value, Some(5));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_is_reported_with_its_reason() {
    let (sender, receiver) = oneshot::channel::<Report<u32>>();
    let outcome = Deferred::<u32>::reject_with(LegacyFailure)
        .as_callback(move |error, value| {
            let _ = sender.send((error, value));
        })
        .await;
    assert!(matches!(outcome, Err(ref e) if e.downcast_ref::<LegacyFailure>().is_some()));

    let (error, value) = receiver.await.unwrap();
    assert!(value.is_none());
    assert!(error.unwrap().downcast_ref::<LegacyFailure>().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_rejection_still_reports_an_error() {
    let (sender, receiver) = oneshot::channel::<Report<u8>>();
    let calls = Arc::new(Mutex::new(0));
    let calls_cl = Arc::clone(&calls);
    let host = TokioHost::current();

    let outcome = Deferred::<u8>::reject(Error::Empty)
        .as_callback_on(&host, move |error, value| {
            *calls_cl.lock().unwrap() += 1;
            let _ = sender.send((error, value));
        })
        .await;
    assert!(matches!(outcome, Err(Error::Empty)));

    let (error, _) = receiver.await.unwrap();
    let error = error.expect("Callback should always receive an error on rejection");
    assert!(error.cause().is_none(), "Absent reason should stay absent");
    assert!(host.drain().await.iter().all(Result::is_ok));
    assert_eq!(*calls.lock().unwrap(), 1, "Callback should run exactly once");
}

// A single-threaded runtime runs posted tasks only when the test yields.
#[tokio::test]
async fn callback_is_not_invoked_synchronously() {
    let called = Arc::new(Mutex::new(false));
    let called_cl = Arc::clone(&called);
    let host = TokioHost::current();

    let chained = Deferred::resolve(1u8).as_callback_on(&host, move |_, _| {
        *called_cl.lock().unwrap() = true;
    });
    assert!(host.take_posted().is_empty(), "Nothing is posted before the source settles");

    assert_eq!(chained.await.unwrap(), 1);
    assert!(!*called.lock().unwrap(), "Callback should not run synchronously");

    let finished = host.drain().await;
    assert_eq!(finished.len(), 1, "Only the callback runs on the host");
    assert!(*called.lock().unwrap());
}

#[tokio::test]
async fn callback_panic_stays_out_of_the_chain() {
    let host = TokioHost::current();
    let outcome = Deferred::resolve(3u8)
        .as_callback_on(&host, |_, _| panic!("legacy callback blew up"))
        .then(|v| v + 1)
        .await;
    assert_eq!(outcome.unwrap(), 4, "Chain should be unaffected by the callback");

    let finished = host.drain().await;
    assert_eq!(finished.len(), 1);
    let Err(failure) = &finished[0] else {
        panic!("Callback task should have failed");
    };
    assert!(failure.is_panic(), "Panic should surface on the host");
}

#[tokio::test(flavor = "multi_thread")]
async fn runtime_bound_source_reports_through_default_pool() {
    let (sender, receiver) = oneshot::channel::<Report<u8>>();
    let source = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Error>(7u8)
    }
    .deferred();

    let outcome = source
        .as_callback(move |error, value| {
            let _ = sender.send((error, value));
        })
        .await;
    assert_eq!(outcome.unwrap(), 7, "Source should settle on the awaiting runtime");

    let (error, value) = receiver.await.unwrap();
    assert!(error.is_none());
    assert_eq!(value, Some(7));
}

#[tokio::test(flavor = "multi_thread")]
async fn runtime_bound_rejection_reports_through_default_pool() {
    let (sender, receiver) = oneshot::channel::<Report<u8>>();
    let source = async {
        let spawned = tokio::spawn(async { 1u8 });
        spawned.await.unwrap();
        Err::<u8, _>(Error::timeout("upstream"))
    }
    .deferred();

    let outcome = source
        .as_callback(move |error, value| {
            let _ = sender.send((error, value));
        })
        .await;
    assert!(matches!(outcome, Err(Error::Timeout { ref message }) if message == "upstream"));

    let (error, value) = receiver.await.unwrap();
    assert!(value.is_none());
    assert!(error.unwrap().is_timeout());
}

#[tokio::test(flavor = "multi_thread")]
async fn spread_reports_collection_elements() {
    let (sender, receiver) = oneshot::channel::<(Option<Error>, Vec<u8>)>();
    let host = TokioHost::current();
    let values = Deferred::resolve(vec![1u8, 2, 3])
        .as_callback_spread_on(&host, move |error, items| {
            let _ = sender.send((error, items));
        })
        .await
        .unwrap();
    assert_eq!(values, vec![1, 2, 3]);

    let (error, items) = receiver.await.unwrap();
    assert!(error.is_none());
    assert_eq!(items, vec![1, 2, 3]);

    let (sender, receiver) = oneshot::channel::<(Option<Error>, Vec<u8>)>();
    let _ = Deferred::<Vec<u8>>::reject(Error::Empty)
        .as_callback_spread(move |error, items| {
            let _ = sender.send((error, items));
        })
        .await;
    let (error, items) = receiver.await.unwrap();
    assert!(matches!(error, Some(Error::Empty)));
    assert!(items.is_empty());
}
