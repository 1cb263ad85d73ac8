//! Concurrency and load testing for the compositing service.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use emoji_compositor::lifecycle::Shutdown;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_identical_responses() {
    let addr: SocketAddr = "127.0.0.1:28581".parse().unwrap();
    let (dir, config) = common::fixture_config("load_same_key", addr);
    let shutdown = Shutdown::new();
    common::start_server(config, &shutdown).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/generate?top=red&bottom=blue&percent=61", addr);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let res = client.get(&url).send().await.unwrap();
            let status = res.status();
            let miss = res.headers()["cache-hit"] == "false";
            (status, miss, res.bytes().await.unwrap())
        }));
    }

    let mut bodies = Vec::new();
    let mut misses = 0;
    for task in tasks {
        let (status, miss, body) = task.await.unwrap();
        assert_eq!(status, 200);
        if miss {
            misses += 1;
        }
        bodies.push(body);
    }

    assert!(bodies.iter().all(|b| b == &bodies[0]), "all responses byte-identical");
    assert_eq!(misses, 1, "exactly one request computes the composite");

    let stats: serde_json::Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["misses"], 1);

    shutdown.trigger();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    let addr: SocketAddr = "127.0.0.1:28582".parse().unwrap();
    let (dir, config) = common::fixture_config("load_perf", addr);
    let shutdown = Shutdown::new();
    common::start_server(config, &shutdown).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for t in 0..concurrency {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                // overlapping key space: every key is requested by several tasks
                let percent = (t + i) % 10 * 10;
                let url = format!(
                    "http://{}/generate?top=red&bottom=blue&percent={}",
                    addr, percent
                );
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() && res.bytes().await.is_ok() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request succeeds");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);

    let stats: serde_json::Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["entries"], 10);
    assert_eq!(stats["misses"], 10);

    shutdown.trigger();
    std::fs::remove_dir_all(&dir).ok();
}
