//! Load testing for the local gateway.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use tokio::sync::mpsc;

use local_api_gateway::routing::{HandlerSource, Registry};

mod common;

use common::{Fixed, MockBackend};

#[tokio::test]
async fn test_load_performance() {
    // 1. Remote deployment for the unrouted half of the traffic
    let remote = MockBackend::json(StatusCode::OK, r#"{"from":"remote"}"#).await;

    // 2. Gateway with one local route
    let registry = Registry::builder(HandlerSource::None)
        .handler("/api/markets", Fixed::new(StatusCode::OK, r#"{"from":"local"}"#))
        .build();
    let mut config = common::test_config(Some(remote.base_url()));
    config.traffic.capacity = 50;
    let gateway = common::spawn_gateway(config, registry).await;

    // 3. Generate load
    let num_requests = 400;
    let concurrency = 20;
    let client = common::client();
    let (tx, mut rx) = mpsc::channel(num_requests);

    let start = Instant::now();
    for worker in 0..concurrency {
        let client = client.clone();
        let tx = tx.clone();
        let local_url = gateway.url("/api/markets");
        let remote_url = gateway.url("/api/news");
        tokio::spawn(async move {
            for i in 0..(num_requests / concurrency) {
                let url = if (worker + i) % 2 == 0 { &local_url } else { &remote_url };
                let req_start = Instant::now();
                let res = client.get(url).send().await;
                let ok = matches!(&res, Ok(r) if r.status().is_success());
                let _ = tx.send((ok, req_start.elapsed())).await;
            }
        });
    }
    drop(tx);

    // 4. Collect results
    let mut success = 0;
    let mut latencies = Vec::with_capacity(num_requests);
    while let Some((ok, latency)) = rx.recv().await {
        if ok {
            success += 1;
        }
        latencies.push(latency);
    }
    let elapsed = start.elapsed();

    latencies.sort();
    let p99 = latencies[(latencies.len() * 99) / 100 - 1];
    println!(
        "{} requests in {:?} ({:.0} req/s), p99 {:?}",
        num_requests,
        elapsed,
        num_requests as f64 / elapsed.as_secs_f64(),
        p99
    );

    assert_eq!(success, num_requests);
    assert_eq!(remote.hit_count(), num_requests / 2);
    assert!(p99 < Duration::from_secs(5));

    // 5. The traffic log stays bounded under load
    let json: serde_json::Value = client
        .get(gateway.url("/api/local-traffic-log"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["entries"].as_array().unwrap().len(), 50);

    gateway.stop().await;
}
