//! Retry orchestration with adaptive backoff and circuit breaking.
//!
//! # Key Types
//!
//! - [`FailureKind`] and [`classify`] - what went wrong
//! - [`RetryPolicy`] - how long to wait, and whether to try again at all
//! - [`CircuitBreaker`] - whether an attempt may be made right now
//! - [`RetryOrchestrator`] - drives an operation through all of the above
//! - [`RetryEvent`] and [`EventSink`] - lifecycle notifications
//!
//! # Examples
//!
//! ```rust
//! use toolguard_core::error::Failure;
//! use toolguard_core::retry::{RetryOrchestrator, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(100))
//!     .build()?;
//! let orchestrator = RetryOrchestrator::new(policy);
//!
//! let page = orchestrator
//!     .execute("wikipedia_search", || async {
//!         Ok::<_, Failure>("Rust is a systems programming language".to_string())
//!     })
//!     .await?;
//! # let _ = page;
//! # Ok(())
//! # }
//! ```

mod breaker;
mod classify;
mod error;
mod event;
mod orchestrator;
mod policy;
mod stats;

pub use breaker::{BreakerConfig, BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use classify::{Classify, FailureKind, classify};
pub use error::RetryError;
pub use event::{EventSink, ExhaustReason, FnSink, RetryEvent};
pub use orchestrator::{DEFAULT_HISTORY_CAPACITY, DEFAULT_STATS_WINDOW, RetryOrchestrator};
pub use policy::{PolicyError, RetryPolicy, RetryPolicyBuilder};
pub use stats::{PolicySummary, RetryAttemptRecord, RetryStats};
