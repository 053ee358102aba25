use std::time::{Duration, Instant};

use deferred::{DeferredExt, Error, MapOptions};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    let start = Instant::now();
    let jobs = vec![600u64, 100, 300, 200, 400];

    // At most two jobs run at once; a finished job immediately makes room for
    // the next one.
    let results = deferred::map(
        jobs,
        move |ms: u64, index| {
            async move {
                println!("Start job {index} at {:?}", start.elapsed());
                sleep(Duration::from_millis(ms)).await;
                println!("End job {index} at {:?}", start.elapsed());
                Ok::<_, Error>(ms / 100)
            }
            .deferred()
        },
        MapOptions::new().concurrency(2),
    )
    .await
    .unwrap();

    // Results follow input order, not completion order.
    println!("Results: {results:?}");
}
