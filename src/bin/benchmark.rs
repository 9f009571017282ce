use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

const APPS: &[&str] = &["checkout.cpu", "search.cpu", "billing.cpu", "auth.cpu"];
const SPIES: &[&str] = &["rbspy", "pyspy", "gospy", "ebpfspy"];
const FRAMES: &[&str] = &[
    "main", "run", "serve", "handle_request", "parse", "render", "query", "encode", "decode",
    "alloc", "gc", "read", "write", "lock", "hash",
];

fn fast_random(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

/// Collapsed-stack payload with `stacks` lines
fn generate_profile(stacks: usize, seed: &mut u64) -> Vec<u8> {
    let mut body = String::new();
    for _ in 0..stacks {
        let depth = 2 + (fast_random(seed) % 10) as usize;
        let frames: Vec<&str> = (0..depth)
            .map(|_| FRAMES[fast_random(seed) as usize % FRAMES.len()])
            .collect();
        body.push_str(&frames.join(";"));
        body.push(' ');
        body.push_str(&(1 + fast_random(seed) % 100).to_string());
        body.push('\n');
    }
    body.into_bytes()
}

struct BenchmarkStats {
    total_requests: usize,
    total_duration: Duration,
    latencies: Vec<Duration>,
}

impl BenchmarkStats {
    fn requests_per_sec(&self) -> f64 {
        self.total_requests as f64 / self.total_duration.as_secs_f64()
    }

    fn percentile(&self, p: usize) -> Duration {
        let mut sorted = self.latencies.clone();
        sorted.sort();
        sorted[(sorted.len() * p / 100).min(sorted.len() - 1)]
    }

    fn avg_latency(&self) -> Duration {
        let sum: Duration = self.latencies.iter().sum();
        sum / self.latencies.len() as u32
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let stacks_per_profile: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(500);
    let rounds: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
    let concurrency: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(16);
    let host = std::env::var("FLAMEGATE_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("FLAMEGATE_PORT").unwrap_or_else(|_| "4040".to_string());
    let base_url = format!("http://{}:{}", host, port);

    println!("flamegate Benchmark");
    println!("===================");
    println!("Target:             {}", base_url);
    println!("Stacks per profile: {}", stacks_per_profile);
    println!("Rounds:             {}", rounds);
    println!("Concurrency:        {}", concurrency);
    println!();

    let client = Client::new();
    let mut seed: u64 = 12345;
    let mut latencies = Vec::with_capacity(rounds * concurrency);
    let start = Instant::now();

    for _ in 0..rounds {
        let requests = (0..concurrency).map(|i| {
            let body = generate_profile(stacks_per_profile, &mut seed);
            let app = APPS[i % APPS.len()];
            let spy = SPIES[i % SPIES.len()];
            let request = client
                .post(format!("{}/ingest", base_url))
                .query(&[("name", app), ("spyName", spy), ("from", "now-10s")])
                .body(body);

            async move {
                let sent = Instant::now();
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await?;
                    return Ok::<_, reqwest::Error>(Err(format!("{}: {}", status, text)));
                }
                Ok::<_, reqwest::Error>(Ok(sent.elapsed()))
            }
        });

        for result in join_all(requests).await {
            match result? {
                Ok(latency) => latencies.push(latency),
                Err(message) => {
                    eprintln!("Error: {}", message);
                    return Ok(());
                }
            }
        }
    }

    let stats = BenchmarkStats {
        total_requests: latencies.len(),
        total_duration: start.elapsed(),
        latencies,
    };

    if stats.latencies.is_empty() {
        println!("No requests sent");
        return Ok(());
    }

    println!("Requests/sec: {:.0}", stats.requests_per_sec());
    println!("Total time:   {:?}", stats.total_duration);
    println!("Latency:      avg={:?}", stats.avg_latency());
    println!(
        "Percentiles:  p50={:?} p99={:?} max={:?}",
        stats.percentile(50),
        stats.percentile(99),
        stats.percentile(100)
    );
    println!();

    // Print server-side counters
    println!("Server Statistics:");
    let resp: Value = client
        .get(format!("{}/stats", base_url))
        .send()
        .await?
        .json()
        .await?;

    if let Some(counters) = resp["counters"].as_object() {
        for (name, value) in counters {
            println!("  {}: {}", name, value);
        }
    }
    println!("  apps: {}", resp["apps"]);
    println!(
        "  buffers allocated: {}",
        resp["buffers"]["allocated"].as_u64().unwrap_or(0)
    );

    Ok(())
}
