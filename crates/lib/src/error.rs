//! Failure kinds of the relay. None of them crash a request; each is logged by whoever receives it.

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Entry is missing expected fields or has the wrong shape; the entry is skipped.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    /// Handshake without `hub.mode` or `hub.verify_token` (HTTP 400).
    #[error("verification request missing hub.mode or hub.verify_token")]
    MissingVerificationParams,
    /// Wrong mode or token (HTTP 403).
    #[error("verification mode or token mismatch")]
    VerificationMismatch,
    /// Task service unreachable, erroring, or returned something other than a list.
    #[error("task lookup failed: {0}")]
    LookupFailed(String),
    /// Send API call failed. Not retried.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
