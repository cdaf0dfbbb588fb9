//! Tonic-backed transports for the service client.

use core::time::Duration;
use std::sync::Arc;

use gdid::{
    AuthorityTransport, BlockRequest, Connector, EndpointAssignment, Error, GdidBlock, Result,
};
use tonic::transport::{Channel, Endpoint};

use crate::{
    proto::{AllocateBlockRequest, gdid_authority_client::GdidAuthorityClient},
    status::status_to_error,
};

/// A lazily connected gRPC channel to one authority node.
///
/// Cloning shares the underlying HTTP/2 connection.
#[derive(Clone, Debug)]
pub struct TonicTransport {
    client: GdidAuthorityClient<Channel>,
    node: Arc<str>,
}

impl TonicTransport {
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl AuthorityTransport for TonicTransport {
    async fn request_block(&self, request: BlockRequest) -> Result<GdidBlock> {
        let mut client = self.client.clone();
        let response = client
            .allocate_block(AllocateBlockRequest::from(&request))
            .await
            .map_err(|status| {
                #[cfg(feature = "tracing")]
                tracing::debug!(node = %self.node, code = ?status.code(), "AllocateBlock failed");
                status_to_error(&status, &request)
            })?;
        GdidBlock::try_from(response.into_inner())
    }
}

/// Builds [`TonicTransport`]s from endpoint assignments.
///
/// The assignment's node is the URI to dial (`http://host:port`). Channels
/// connect on first use, so building one never blocks; an unreachable node
/// surfaces as [`Error::AuthorityUnavailable`] from the call itself.
#[derive(Clone, Debug, Default)]
pub struct TonicConnector {
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl TonicConnector {
    pub const fn new() -> Self {
        Self {
            connect_timeout: None,
            request_timeout: None,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Per-request timeout applied by the channel. Expiry is reported as
    /// `Cancelled`, which is treated as a transient failure.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl Connector for TonicConnector {
    type Transport = TonicTransport;

    fn connect(&self, assignment: &EndpointAssignment) -> Result<TonicTransport> {
        let node = assignment.node();
        let mut endpoint =
            Endpoint::from_shared(node.to_owned()).map_err(|e| Error::TransportAcquisition {
                node: node.to_owned(),
                reason: e.to_string(),
            })?;

        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(node, contract = assignment.contract(), "Opening lazy channel");

        Ok(TonicTransport {
            client: GdidAuthorityClient::new(endpoint.connect_lazy()),
            node: Arc::from(node),
        })
    }
}
