//! # toolguard
//!
//! Resilience layer for the remote tools an LLM backend calls (web search,
//! encyclopedia lookups, vector stores):
//! - Failure classification and per-kind adaptive backoff
//! - A circuit breaker that stops hammering a failing service
//! - A capacity-bounded response cache with per-entry TTL
//! - Structured logging of every retry and a combined health report
//!
//! The primitives live in [`toolguard_core`]; this crate adds the cache,
//! configuration and the [`Guard`] facade that ties them together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guard = Arc::new(Guard::new(GuardConfig::from_env()?));
//!
//!     let summary: String = guard
//!         .call(
//!             "wikipedia",
//!             "Ferris the crab",
//!             &CacheParams::new().with("sentences", 3),
//!             Some(ttl::WIKIPEDIA),
//!             || async { Ok::<_, Failure>("Ferris is the Rust mascot.".to_string()) },
//!         )
//!         .await?;
//!
//!     println!("{summary}");
//!     println!("{}", serde_json::to_string_pretty(&guard.health())?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use cache::{CacheKey, CacheParams, CacheStats, ResponseCache};
pub use config::{CacheConfig, GuardConfig, HistoryConfig};
pub use error::{Error, Result};
pub use guard::Guard;
pub use health::{HealthReport, HealthStatus};
pub use observability::TracingSink;

// Module declarations
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod health;
pub mod observability;

// Re-export the core crate for convenience
pub use toolguard_core;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use toolguard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::ttl;
    pub use crate::{
        CacheParams, Guard, GuardConfig, HealthReport, HealthStatus, ResponseCache, TracingSink,
    };
    pub use toolguard_core::prelude::*;
}

/// Crate version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
