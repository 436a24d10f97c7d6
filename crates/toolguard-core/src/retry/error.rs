use super::classify::FailureKind;
use super::event::ExhaustReason;
use thiserror::Error;

/// Final outcome of a call that did not succeed.
///
/// Every variant keeps the operation's own error (when one occurred) along
/// with its kind and the number of attempts made. The orchestrator never
/// replaces the real failure with a generic one.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable kind.
    #[error("{operation} failed after {attempts} attempt(s) [{kind}]: {source}")]
    Exhausted {
        /// Operation name
        operation: String,
        /// Attempts made
        attempts: u32,
        /// Kind of the last failure
        kind: FailureKind,
        /// The last failure
        #[source]
        source: E,
    },

    /// The failure kind is not worth retrying.
    #[error("{operation} failed with non-retryable {kind} error after {attempts} attempt(s): {source}")]
    NonRetryable {
        /// Operation name
        operation: String,
        /// Attempts made
        attempts: u32,
        /// Kind of the failure
        kind: FailureKind,
        /// The failure
        #[source]
        source: E,
    },

    /// The circuit breaker refused to let the call continue.
    #[error("{operation} refused by open circuit breaker after {attempts} attempt(s)")]
    CircuitOpen {
        /// Operation name
        operation: String,
        /// Attempts made before the refusal
        attempts: u32,
        /// Kind of the last failure, if any attempt ran
        kind: Option<FailureKind>,
        /// The last failure, if any attempt ran
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    pub(crate) fn stopped(
        reason: ExhaustReason,
        operation: &str,
        attempts: u32,
        kind: FailureKind,
        error: E,
    ) -> Self {
        let operation = operation.to_string();
        match reason {
            ExhaustReason::AttemptsExhausted => RetryError::Exhausted {
                operation,
                attempts,
                kind,
                source: error,
            },
            ExhaustReason::NonRetryable => RetryError::NonRetryable {
                operation,
                attempts,
                kind,
                source: error,
            },
            ExhaustReason::CircuitOpen => RetryError::CircuitOpen {
                operation,
                attempts,
                kind: Some(kind),
                last_error: Some(error),
            },
        }
    }

    /// Why the call stopped.
    pub fn reason(&self) -> ExhaustReason {
        match self {
            RetryError::Exhausted { .. } => ExhaustReason::AttemptsExhausted,
            RetryError::NonRetryable { .. } => ExhaustReason::NonRetryable,
            RetryError::CircuitOpen { .. } => ExhaustReason::CircuitOpen,
        }
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        match self {
            RetryError::Exhausted { operation, .. }
            | RetryError::NonRetryable { operation, .. }
            | RetryError::CircuitOpen { operation, .. } => operation,
        }
    }

    /// Attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::NonRetryable { attempts, .. }
            | RetryError::CircuitOpen { attempts, .. } => *attempts,
        }
    }

    /// Kind of the last failure, if any attempt ran.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            RetryError::Exhausted { kind, .. } | RetryError::NonRetryable { kind, .. } => {
                Some(*kind)
            }
            RetryError::CircuitOpen { kind, .. } => *kind,
        }
    }

    /// Whether the breaker, not the operation, ended the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RetryError::CircuitOpen { .. })
    }

    /// The operation's last error, if any attempt ran.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
            RetryError::CircuitOpen { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Unwrap the operation's last error, if any attempt ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
            RetryError::CircuitOpen { last_error, .. } => last_error,
        }
    }
}
