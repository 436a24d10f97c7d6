//! Boundary error handling.
//!
//! Vendor clients fail with their own error types. At the point where those
//! errors enter the resilience layer they are converted into [`Failure`], a
//! plain value carrying an optional status code and a message, so the
//! classifier works on typed data instead of probing arbitrary errors.
//!
//! - [`Failure`] - the typed failure value
//! - [`error_boundary!`](crate::error_boundary) - declarative `From` adapters

mod boundary;
mod failure;

pub use failure::Failure;
