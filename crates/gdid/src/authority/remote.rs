use core::time::Duration;
use std::sync::Arc;

use portable_atomic::{AtomicUsize, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    authority::{AuthorityTransport, BlockSource},
    client::{CallOptions, ServiceClient},
    error::Result,
    gdid::{BlockRequest, GdidBlock},
    resolver::RequestKey,
    transport::Connector,
};

/// A [`BlockSource`] that asks a sharded remote authority for blocks.
///
/// Each request goes through [`ServiceClient::call_with`] with a rotating
/// shard key, so successive refills spread across authority shards. Replies
/// are validated against the request before they are handed out.
pub struct RemoteBlockSource<C: Connector> {
    client: Arc<ServiceClient<C>>,
    key: RequestKey,
    call_timeout: Option<Duration>,
    rotation: AtomicUsize,
}

impl<C> RemoteBlockSource<C>
where
    C: Connector,
    C::Transport: AuthorityTransport,
{
    pub fn new(client: Arc<ServiceClient<C>>, key: RequestKey) -> Self {
        Self {
            client,
            key,
            call_timeout: None,
            rotation: AtomicUsize::new(0),
        }
    }

    /// Bounds every remote call, failover included.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub const fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub const fn request_key(&self) -> &RequestKey {
        &self.key
    }

    pub fn client(&self) -> &Arc<ServiceClient<C>> {
        &self.client
    }
}

impl<C> BlockSource for RemoteBlockSource<C>
where
    C: Connector,
    C::Transport: AuthorityTransport,
{
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(scope = %request.scope_name, sequence = %request.sequence_name))
    )]
    async fn allocate_block(&self, request: BlockRequest) -> Result<GdidBlock> {
        request.validate()?;

        let shard_key = self.rotation.fetch_add(1, Ordering::Relaxed);
        let options = CallOptions {
            reserved: false,
            timeout: self.call_timeout,
        };

        let block = self
            .client
            .call_with(&self.key, &shard_key, options, |transport| {
                let request = request.clone();
                async move { transport.request_block(request).await }
            })
            .await?;

        block.validate_for(&request)?;
        Ok(block)
    }
}
