use std::time::{Duration, Instant};

use deferred::{Deferred, DeferredExt, Error, Sleep};

#[derive(Debug, thiserror::Error)]
#[error("custom deadline")]
struct CustomDeadline;

fn later<T: Send + 'static>(value: T, ms: u64) -> Deferred<T> {
    async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, Error>(value)
    }
    .deferred()
}

#[tokio::test(flavor = "multi_thread")]
async fn sleep_waits_until_deadline() {
    let start = Instant::now();
    let sleep = Sleep::new(Duration::from_millis(30));
    let deadline = sleep.deadline();
    sleep.await;
    assert!(Instant::now() >= deadline);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test(flavor = "multi_thread")]
async fn delay_starts_after_source_settles() {
    let start = Instant::now();
    let value = later(5u8, 40).delay(Duration::from_millis(40)).await.unwrap();
    assert_eq!(value, 5);
    assert!(
        start.elapsed() >= Duration::from_millis(80),
        "Delay should be counted from the moment the value arrived"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delay_passes_rejection_through() {
    let start = Instant::now();
    let outcome = Deferred::<u8>::reject(Error::Empty)
        .delay(Duration::from_millis(500))
        .await;
    assert!(matches!(outcome, Err(Error::Empty)));
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[tokio::test(flavor = "multi_thread")]
async fn static_delay_resolves_with_value() {
    let start = Instant::now();
    let value = deferred::delay(Duration::from_millis(30), "done").await.unwrap();
    assert_eq!(value, "done");
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_uses_default_message() {
    let outcome = later(1u8, 300).timeout(Duration::from_millis(20)).await;
    let Err(error) = outcome else {
        panic!("Source should have lost the race");
    };
    assert!(error.is_timeout());
    assert_eq!(error.to_string(), "Request timed out");
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_with_message() {
    let outcome = later(1u8, 300)
        .timeout_with(Duration::from_millis(20), "too slow")
        .await;
    assert!(matches!(outcome, Err(Error::Timeout { ref message }) if message == "too slow"));
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_with_error_is_delivered_unchanged() {
    let reason = Error::reason(CustomDeadline);
    let outcome = later(1u8, 300)
        .timeout_with(Duration::from_millis(20), reason.clone())
        .await;
    let Err(error) = outcome else {
        panic!("Source should have lost the race");
    };
    assert!(!error.is_timeout());
    assert!(std::sync::Arc::ptr_eq(
        error.cause().unwrap(),
        reason.cause().unwrap()
    ));
    assert!(error.downcast_ref::<CustomDeadline>().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn source_that_settles_first_wins() {
    let value = later(7u8, 5)
        .timeout(Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(value, 7);

    let rejected = Deferred::<u8>::reject(Error::Empty)
        .timeout(Duration::from_millis(500))
        .await;
    assert!(matches!(rejected, Err(Error::Empty)));
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_counts_from_creation() {
    let guarded = later(1u8, 60).timeout(Duration::from_millis(30));
    tokio::time::sleep(Duration::from_millis(40)).await;
    let start = Instant::now();
    let outcome = guarded.await;
    assert!(matches!(outcome, Err(ref e) if e.is_timeout()));
    assert!(start.elapsed() < Duration::from_millis(20));
}

#[tokio::test(flavor = "multi_thread")]
async fn extension_works_on_plain_futures() {
    let value = async { Ok::<_, Error>(3u8) }
        .delay(Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(value, 3);

    let outcome = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok::<_, Error>(3u8)
    }
    .timeout(Duration::from_millis(10))
    .await;
    assert!(matches!(outcome, Err(ref e) if e.is_timeout()));
}

#[tokio::test(flavor = "multi_thread")]
async fn many_timers_fire_in_order() {
    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let handles: Vec<_> = [50u64, 10, 30, 20, 40]
        .into_iter()
        .map(|ms| {
            let order = std::sync::Arc::clone(&order);
            tokio::spawn(async move {
                Sleep::new(Duration::from_millis(ms)).await;
                order.lock().unwrap().push(ms);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![10, 20, 30, 40, 50]);
}
