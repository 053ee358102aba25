use std::time::Duration;

use deferred::{Deferred, DeferredExt, Error};
use tokio::time::sleep;

fn fetch(id: u32) -> Deferred<String> {
    async move {
        println!("Fetching record {id}");
        sleep(Duration::from_millis(200 * u64::from(4 - id))).await;
        Ok::<_, Error>(format!("record-{id}"))
    }
    .deferred()
}

#[tokio::main]
async fn main() {
    // Each record is awaited and handled before the next one is touched,
    // even though record 1 takes the longest to arrive.
    let fetched = vec![fetch(1), fetch(2), fetch(3)];
    let records = deferred::each(fetched, |record: &String, index, len| {
        println!("Handled {record} ({}/{len})", index + 1);
    })
    .await
    .unwrap();
    println!("Records: {records:?}");

    let lengths = deferred::map_series(records, |record: String, _, _| record.len())
        .await
        .unwrap();
    println!("Lengths: {lengths:?}");

    let total = deferred::reduce(lengths, |acc: usize, len: usize, _, _| acc + len, 0usize)
        .await
        .unwrap();
    println!("Total length: {total}");
}
