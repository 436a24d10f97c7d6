#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core resilience primitives for remote tool calls.
//!
//! This crate holds the pieces every guarded call goes through:
//!
//! - **Failure classification** via [`Classify`](retry::Classify) and
//!   [`classify`](retry::classify), mapping status codes and error text onto
//!   a fixed set of [`FailureKind`](retry::FailureKind)s
//! - **Adaptive backoff** via [`RetryPolicy`](retry::RetryPolicy), with a
//!   different curve for rate limits, overload and everything else
//! - **Circuit breaking** via [`CircuitBreaker`](retry::CircuitBreaker)
//! - **Retry orchestration** via [`RetryOrchestrator`](retry::RetryOrchestrator),
//!   which emits [`RetryEvent`](retry::RetryEvent)s and keeps stats
//! - **Boundary adapters** via the [`error_boundary!`] macro and the
//!   [`Failure`](error::Failure) value type
//!
//! # Examples
//!
//! ```rust
//! use toolguard_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(100))
//!     .build()?;
//! let orchestrator = RetryOrchestrator::new(policy);
//!
//! let answer = orchestrator
//!     .execute("wikipedia_search", || async { Ok::<_, Failure>(42) })
//!     .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod retry;


/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use toolguard_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::Failure;
    pub use crate::error_boundary;
    pub use crate::retry::{
        BreakerConfig, CircuitBreaker, CircuitState, Classify, EventSink, ExhaustReason,
        FailureKind, FnSink, RetryError, RetryEvent, RetryOrchestrator, RetryPolicy,
        RetryPolicyBuilder, RetryStats, classify,
    };
}
