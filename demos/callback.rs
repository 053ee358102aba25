use std::{sync::mpsc, time::Duration};

use deferred::{Deferred, Error};
use futures::future;

fn legacy_handler(
    done: mpsc::Sender<String>,
) -> impl FnOnce(Option<Error>, Option<u32>) + Send + 'static {
    move |error, value| {
        let line = match (error, value) {
            (Some(error), _) => format!("callback got error: {error}"),
            (None, value) => format!("callback got value: {value:?}"),
        };
        let _ = done.send(line);
    }
}

fn main() {
    let (done, reports) = mpsc::channel();

    // The bridged values still have to be driven; the callbacks run on the
    // default pool once they settle.
    let fulfilled = deferred::delay(Duration::from_millis(100), 42u32)
        .as_callback(legacy_handler(done.clone()));
    let rejected = Deferred::<u32>::reject(Error::timeout("upstream unavailable"))
        .as_callback(legacy_handler(done));
    let outcomes = futures::executor::block_on(future::join(fulfilled, rejected));
    println!("chained outcomes: {outcomes:?}");

    for line in reports.iter().take(2) {
        println!("{line}");
    }
}
