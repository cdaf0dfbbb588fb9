//! Error types for shard routing, transport pooling and GDID allocation.
//!
//! All failures surface through the single [`Error`] enum. It is `Clone` so
//! that one failed refill can be handed to every caller attached to it.
//!
//! ## Error Cases
//! - `Routing`: no shard or endpoint matched a request. Never retried.
//! - `TransportAcquisition`: a transport could not be built or the network
//!   failed underneath it. The service client fails over to the next endpoint
//!   of the shard.
//! - `AuthorityTimeout` / `AuthorityUnavailable`: the remote block request
//!   failed or exceeded its deadline.
//! - `MalformedBlock`: the authority answered with something that is not a
//!   valid block.
//! - `InvalidRequest`: the caller asked for something outside the configured
//!   bounds.
//! - `EraExhausted`: a counter space ran out of room for the current era.

use core::time::Duration;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for resolution, pooling and allocation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No shard matched the request. Fatal for the call.
    #[error("Routing error: {context}")]
    Routing { context: String },

    /// A transport could not be obtained for an endpoint.
    #[error("Transport acquisition failed for {node}: {reason}")]
    TransportAcquisition { node: String, reason: String },

    /// The remote block request exceeded its deadline.
    #[error("Authority call timed out after {timeout:?}")]
    AuthorityTimeout { timeout: Duration },

    /// The remote authority refused or failed the block request.
    #[error("Authority unavailable: {reason}")]
    AuthorityUnavailable { reason: String },

    /// The authority answered with a block that fails validation.
    #[error("Malformed block: {reason}")]
    MalformedBlock { reason: String },

    /// The request was invalid or exceeded configured limits.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The counter space of `scope::sequence` is used up for this era.
    #[error("Counter space exhausted for {scope}::{sequence}")]
    EraExhausted { scope: String, sequence: String },

    /// A string could not be parsed into an [`Atom`](crate::Atom).
    #[error("Invalid atom {value:?}: {reason}")]
    InvalidAtom { value: String, reason: &'static str },

    /// An endpoint descriptor is incomplete or inconsistent.
    #[error("Invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },
}

impl Error {
    /// Returns `true` when the failure is tied to one endpoint and the next
    /// endpoint of the same shard may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransportAcquisition { .. } | Self::AuthorityUnavailable { .. }
        )
    }

    pub(crate) fn routing(context: impl Into<String>) -> Self {
        Self::Routing {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedBlock {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_endpoint_local_failures_are_transient() {
        assert!(
            Error::TransportAcquisition {
                node: "grpc://a".into(),
                reason: "refused".into()
            }
            .is_transient()
        );
        assert!(
            Error::AuthorityUnavailable {
                reason: "down".into()
            }
            .is_transient()
        );
        assert!(!Error::routing("none").is_transient());
        assert!(!Error::malformed("size 0").is_transient());
        assert!(
            !Error::AuthorityTimeout {
                timeout: Duration::from_secs(1)
            }
            .is_transient()
        );
    }
}
