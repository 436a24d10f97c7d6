//! Example: driving a flaky search call through the retry orchestrator
//!
//! This example demonstrates:
//! 1. Rate-limit backoff (delays escalate fastest for 429s)
//! 2. Fast failure on a non-retryable authentication error
//! 3. The circuit breaker refusing calls after sustained failure
//!
//! Run with:
//! ```bash
//! cargo run -p toolguard-core --example retry_example
//! ```

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use toolguard_core::prelude::*;

/// A simulated search API that fails a fixed number of times
struct FlakySearch {
    attempts: Arc<AtomicU32>,
    fail_count: u32,
    failure: Failure,
}

impl FlakySearch {
    fn new(fail_count: u32, failure: Failure) -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_count,
            failure,
        }
    }

    async fn search(&self, query: &str) -> Result<String, Failure> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED ({})", attempt + 1, self.failure);
            Err(self.failure.clone())
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok(format!("top results for '{query}'"))
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

fn printing_sink() -> FnSink<impl Fn(RetryEvent) -> std::future::Ready<()> + Send + Sync> {
    FnSink(|event: RetryEvent| {
        match &event {
            RetryEvent::Delay {
                delay, failure_kind, ..
            } => println!("  -> {failure_kind}: waiting {delay:?}"),
            RetryEvent::Exhausted { reason, .. } => println!("  -> giving up ({reason:?})"),
            _ => {}
        }
        std::future::ready(())
    })
}

/// Example 1: rate limits back off 2x, 4x, ...
async fn example_rate_limit() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Rate-limit backoff ===\n");

    let orchestrator = RetryOrchestrator::new(
        RetryPolicy::builder()
            .max_attempts(4)
            .base_delay(Duration::from_millis(50))
            .jitter_factor(0.0)
            .build()?,
    );
    let api = FlakySearch::new(2, Failure::with_status(429, "too many requests"));
    let sink = printing_sink();

    let start = Instant::now();
    let result = orchestrator
        .execute_with_retry("tavily_search", Some(&sink), || api.search("rust async"))
        .await?;

    println!("\nResult: {result}");
    println!("Total attempts: {}", api.total_attempts());
    println!("Time elapsed: {:?}", start.elapsed());
    Ok(())
}

/// Example 2: authentication failures are not retried
async fn example_non_retryable() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Non-retryable failure ===\n");

    let orchestrator = RetryOrchestrator::new(RetryPolicy::builder().max_attempts(5).build()?);
    let api = FlakySearch::new(10, Failure::with_status(401, "invalid api key"));
    let sink = printing_sink();

    match orchestrator
        .execute_with_retry("tavily_search", Some(&sink), || api.search("rust async"))
        .await
    {
        Ok(_) => println!("unexpected success"),
        Err(err) => println!("\nFailed as expected: {err}"),
    }
    println!("Total attempts: {}", api.total_attempts());
    Ok(())
}

/// Example 3: the breaker trips and refuses further calls
async fn example_circuit_breaker() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Circuit breaker ===\n");

    let orchestrator = RetryOrchestrator::new(
        RetryPolicy::builder()
            .max_attempts(10)
            .base_delay(Duration::from_millis(10))
            .build()?,
    )
    .with_breaker(BreakerConfig {
        failure_threshold: 3,
        recovery_timeout: Duration::from_secs(30),
    });
    let api = FlakySearch::new(u32::MAX, Failure::with_status(503, "service unavailable"));
    let sink = printing_sink();

    for call in 1..=2 {
        println!("Call {call}:");
        if let Err(err) = orchestrator
            .execute_with_retry("wikipedia_search", Some(&sink), || api.search("ferris"))
            .await
        {
            println!("  {err}");
        }
    }

    let stats = orchestrator.stats();
    println!("\nStats: {}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    example_rate_limit().await?;
    example_non_retryable().await?;
    example_circuit_breaker().await?;
    Ok(())
}
