use crate::{endpoint::EndpointAssignment, error::Result};

/// Builds and tears down transports for endpoint assignments.
///
/// `connect` is called while the pool holds its publication lock, so it must
/// not perform network I/O. Implementations should hand back a lazily
/// connecting handle (such as a channel that dials on first use) and let
/// connection failures surface from the unit of work instead.
pub trait Connector: Send + Sync + 'static {
    /// A cheap-to-clone handle onto a live connection or channel.
    type Transport: Clone + Send + Sync + 'static;

    /// Creates a transport bound to `assignment`.
    ///
    /// # Errors
    ///
    /// Should return [`Error::TransportAcquisition`] when the endpoint cannot
    /// be addressed, which lets the caller fail over to the next endpoint.
    ///
    /// [`Error::TransportAcquisition`]: crate::Error::TransportAcquisition
    fn connect(&self, assignment: &EndpointAssignment) -> Result<Self::Transport>;

    /// Disposes a transport the pool or a reserved lease is done with.
    ///
    /// The default simply drops it.
    fn dispose(&self, transport: Self::Transport) {
        drop(transport);
    }
}
