//! Failure classification.

use crate::error::Failure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of failure classes the retry engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote side asked us to slow down (429).
    RateLimit,
    /// Generic server-side failure (500, 502, 503).
    ServerError,
    /// The service is overloaded (529).
    Overload,
    /// Connection, DNS or other transport trouble.
    Network,
    /// The call did not finish in time.
    Timeout,
    /// Credentials were rejected (401, 403).
    Authentication,
    /// The resource is not reachable for this caller (404).
    Permission,
    /// Anything else.
    Unknown,
}

impl FailureKind {
    /// Every kind, in declaration order.
    pub const ALL: [FailureKind; 8] = [
        FailureKind::RateLimit,
        FailureKind::ServerError,
        FailureKind::Overload,
        FailureKind::Network,
        FailureKind::Timeout,
        FailureKind::Authentication,
        FailureKind::Permission,
        FailureKind::Unknown,
    ];

    /// Stable snake_case name, as used in events and stats.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RateLimit => "rate_limit",
            FailureKind::ServerError => "server_error",
            FailureKind::Overload => "overload",
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Authentication => "authentication",
            FailureKind::Permission => "permission",
            FailureKind::Unknown => "unknown",
        }
    }

    fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(FailureKind::RateLimit),
            500 | 502 | 503 => Some(FailureKind::ServerError),
            529 => Some(FailureKind::Overload),
            401 | 403 => Some(FailureKind::Authentication),
            404 => Some(FailureKind::Permission),
            _ => None,
        }
    }

    fn from_message(message: &str) -> Option<Self> {
        let message = message.to_lowercase();
        if ["timeout", "timed out"].iter().any(|t| message.contains(t)) {
            Some(FailureKind::Timeout)
        } else if ["network", "connection", "dns"]
            .iter()
            .any(|t| message.contains(t))
        {
            Some(FailureKind::Network)
        } else {
            None
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error the classifier can read.
///
/// Implemented for [`Failure`], [`std::io::Error`],
/// [`tokio::time::error::Elapsed`] and [`anyhow::Error`]. Vendor error types
/// either implement this directly or are converted into [`Failure`] with
/// [`error_boundary!`](crate::error_boundary).
pub trait Classify {
    /// HTTP-style status code, if the failure carries one.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Human-readable description used for text matching.
    fn message(&self) -> String;
}

impl Classify for Failure {
    fn status_code(&self) -> Option<u16> {
        self.status()
    }

    fn message(&self) -> String {
        Failure::message(self).to_string()
    }
}

impl Classify for std::io::Error {
    fn message(&self) -> String {
        match self.kind() {
            std::io::ErrorKind::TimedOut => format!("timed out: {self}"),
            _ => self.to_string(),
        }
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn message(&self) -> String {
        format!("timed out: {self}")
    }
}

impl Classify for anyhow::Error {
    fn status_code(&self) -> Option<u16> {
        self.chain()
            .find_map(|cause| cause.downcast_ref::<Failure>())
            .and_then(Failure::status)
    }

    fn message(&self) -> String {
        format!("{self:#}")
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn message(&self) -> String {
        (**self).message()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn message(&self) -> String {
        (**self).message()
    }
}

/// Map a failure onto a [`FailureKind`].
///
/// A recognised status code wins; otherwise the lowercased message is
/// searched for timeout and then network markers; otherwise the kind is
/// [`FailureKind::Unknown`]. Total and deterministic.
///
/// # Examples
///
/// ```
/// use toolguard_core::error::Failure;
/// use toolguard_core::retry::{FailureKind, classify};
///
/// assert_eq!(classify(&Failure::with_status(429, "")), FailureKind::RateLimit);
/// assert_eq!(classify(&Failure::new("Connection reset")), FailureKind::Network);
/// assert_eq!(classify(&Failure::new("???")), FailureKind::Unknown);
/// ```
pub fn classify<E: Classify + ?Sized>(error: &E) -> FailureKind {
    error
        .status_code()
        .and_then(FailureKind::from_status)
        .or_else(|| FailureKind::from_message(&error.message()))
        .unwrap_or(FailureKind::Unknown)
}
