/// Declares how a vendor error crosses into the resilience layer.
///
/// Generates a `From` implementation so adapters can use the `?` operator
/// and hand a classifiable error to the retry orchestrator. The usual target
/// is [`Failure`](crate::error::Failure), but any local error type works.
///
/// # Syntax
///
/// ```ignore
/// error_boundary!(SourceError => TargetError, |err_var| {
///     // conversion logic returning TargetError
/// });
/// ```
///
/// # Example
///
/// ```
/// use toolguard_core::error::Failure;
/// use toolguard_core::error_boundary;
/// use toolguard_core::retry::{FailureKind, classify};
///
/// #[derive(Debug)]
/// struct SearchApiError {
///     http_status: u16,
///     body: String,
/// }
///
/// error_boundary!(SearchApiError => Failure, |e| {
///     Failure::with_status(e.http_status, e.body)
/// });
///
/// fn search() -> Result<String, Failure> {
///     let response: Result<String, SearchApiError> = Err(SearchApiError {
///         http_status: 429,
///         body: "slow down".into(),
///     });
///     Ok(response?)
/// }
///
/// let failure = search().unwrap_err();
/// assert_eq!(classify(&failure), FailureKind::RateLimit);
/// ```
#[macro_export]
macro_rules! error_boundary {
    ($inner:ty => $outer:ty, |$err:ident| $body:expr) => {
        impl ::std::convert::From<$inner> for $outer {
            fn from($err: $inner) -> $outer {
                $body
            }
        }
    };
}
