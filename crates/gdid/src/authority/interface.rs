use core::future::Future;

use crate::{
    error::Result,
    gdid::{BlockRequest, GdidBlock},
};

/// Anything that can hand out [`GdidBlock`]s.
///
/// The allocator only ever talks to this trait, so a network-backed authority
/// and an in-process ledger are interchangeable.
pub trait BlockSource: Send + Sync + 'static {
    /// Reserves a block for `request`.
    ///
    /// The returned block may be smaller than requested but never larger, and
    /// never overlaps another block issued for the same scope, sequence,
    /// authority and era.
    ///
    /// # Errors
    ///
    /// Implementation specific; see [`crate::Error`].
    fn allocate_block(&self, request: BlockRequest) -> impl Future<Output = Result<GdidBlock>> + Send;
}

/// A transport able to carry the remote allocation call.
///
/// Implemented by whatever [`crate::Connector::Transport`] the remote block
/// source is built over.
pub trait AuthorityTransport: Clone + Send + Sync + 'static {
    /// Sends `request` to the authority behind this transport.
    ///
    /// # Errors
    ///
    /// Network failures should map to [`crate::Error::AuthorityUnavailable`]
    /// so the failover loop moves on to the next endpoint.
    fn request_block(&self, request: BlockRequest) -> impl Future<Output = Result<GdidBlock>> + Send;
}
