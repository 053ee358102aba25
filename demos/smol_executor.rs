use std::time::Duration;

use deferred::{DeferredExt, Error, MapOptions};
use macro_rules_attribute::apply;
use smol::Timer;
use smol_macros::{Executor, main};

#[apply(main!)]
async fn main(ex: &Executor<'_>) {
    let task = ex.spawn(async {
        deferred::map(
            vec![3u64, 1, 2],
            |secs: u64, index| {
                async move {
                    println!("Job {index} started");
                    Timer::after(Duration::from_secs(secs)).await;
                    println!("Job {index} done");
                    Ok::<_, Error>(secs * 10)
                }
                .deferred()
            },
            MapOptions::new().concurrency(2),
        )
        .timeout(Duration::from_secs(5))
        .await
    });

    println!("After task spawn");
    println!("Results: {:?}", task.await);
}
