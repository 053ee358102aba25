use std::time::Duration;

use deferred::{DeferredExt, Error};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    let future = async {
        println!("Start future 1");
        sleep(Duration::from_secs(1)).await;
        println!("End future 1");
        Ok::<_, Error>(1u8)
    };

    let future2 = async {
        println!("Start future 2");
        sleep(Duration::from_secs(3)).await;
        println!("End future 2");
        Ok::<_, Error>(2u8)
    };

    // Has enough time to complete.
    println!("{:?}", future.deferred().timeout(Duration::from_secs(2)).await);

    // Does not have enough time, will time out.
    println!(
        "{:?}",
        future2
            .deferred()
            .timeout_with(Duration::from_secs(2), "future 2 is too slow")
            .await
    );

    // The delay starts only once the value is there.
    let delayed = deferred::delay(Duration::from_millis(500), "delayed").await;
    println!("{delayed:?}");
}
