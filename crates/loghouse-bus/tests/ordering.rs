//! Per-key ordering under concurrent publishers.
//!
//! Two projects publish concurrently from separate tasks. Each project's
//! messages must be observed in publish order, regardless of how the two
//! streams interleave across partitions.

use std::time::Duration;

use bytes::Bytes;
use loghouse_bus::{BusConsumer, BusProducer, InMemoryBus};

const PER_PROJECT: u32 = 50;

#[tokio::test]
async fn concurrent_publishers_preserve_per_project_order() {
    let bus = InMemoryBus::new(8);

    let mut tasks = Vec::new();
    for project in ["tenant-a", "tenant-b"] {
        let producer = bus.producer();
        tasks.push(tokio::spawn(async move {
            for i in 0..PER_PROJECT {
                producer
                    .publish(project.as_bytes(), Bytes::from(format!("{project}:{i}")))
                    .await
                    .unwrap();
                // Yield so the two publishers genuinely interleave.
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut consumer = bus.subscribe("order-check");
    let mut seen_a = Vec::new();
    let mut seen_b = Vec::new();
    for _ in 0..(PER_PROJECT * 2) {
        let message = consumer
            .poll(Duration::from_millis(500))
            .await
            .unwrap()
            .expect("all published messages must be delivered");
        let text = String::from_utf8(message.value.to_vec()).unwrap();
        let (project, index) = text.split_once(':').unwrap();
        let index: u32 = index.parse().unwrap();
        match project {
            "tenant-a" => seen_a.push(index),
            "tenant-b" => seen_b.push(index),
            other => panic!("unexpected project {other}"),
        }
    }

    let expected: Vec<u32> = (0..PER_PROJECT).collect();
    assert_eq!(seen_a, expected, "tenant-a must arrive in publish order");
    assert_eq!(seen_b, expected, "tenant-b must arrive in publish order");
}
