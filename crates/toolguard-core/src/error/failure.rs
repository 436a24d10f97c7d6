use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// A failure reported by a remote tool call.
///
/// Carries the HTTP-style status code when the remote side supplied one and
/// the textual message either way. This is the shape the classifier reads;
/// see [`classify`](crate::retry::classify).
///
/// # Examples
///
/// ```
/// use toolguard_core::error::Failure;
///
/// let failure = Failure::with_status(529, "overloaded");
/// assert_eq!(failure.status(), Some(529));
/// assert_eq!(failure.to_string(), "status 529: overloaded");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    message: String,
}

impl Failure {
    /// Create a failure with no status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create a failure carrying a status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// The status code, if the remote side reported one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Failure {}

crate::error_boundary!(io::Error => Failure, |e| {
    match e.kind() {
        io::ErrorKind::TimedOut => Failure::new(format!("timed out: {e}")),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe => Failure::new(format!("connection error: {e}")),
        _ => Failure::new(e.to_string()),
    }
});

crate::error_boundary!(tokio::time::error::Elapsed => Failure, |e| {
    Failure::new(format!("operation timed out: {e}"))
});
