use std::sync::Arc;

use crate::{
    authority::{AuthorityTransport, BlockSource, LocalBlockSource, RemoteBlockSource},
    client::ServiceClient,
    config::AccessorConfig,
    error::Result,
    gdid::{BlockLedger, BlockRequest, GdidBlock},
    resolver::RequestKey,
    transport::Connector,
};

/// Block source picked by configuration: either a remote authority reached
/// through a [`ServiceClient`], or an in-process [`BlockLedger`].
pub enum AuthorityAccessor<C: Connector> {
    Remote(RemoteBlockSource<C>),
    Local(LocalBlockSource),
}

impl<C> AuthorityAccessor<C>
where
    C: Connector,
    C::Transport: AuthorityTransport,
{
    /// Builds the accessor described by `config`.
    ///
    /// `client` is only used by the remote variant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRequest`] if a local ledger cannot be
    /// built from the given authority and block size.
    pub fn from_config(config: &AccessorConfig, client: Arc<ServiceClient<C>>) -> Result<Self> {
        match config {
            AccessorConfig::Remote {
                remote_address,
                contract,
                network,
                binding,
                ..
            } => {
                let key = RequestKey::new(remote_address.as_str(), contract.as_str(), *network, *binding);
                let mut source = RemoteBlockSource::new(client, key);
                if let Some(timeout) = config.call_timeout() {
                    source = source.with_call_timeout(timeout);
                }
                Ok(Self::Remote(source))
            }
            AccessorConfig::Local {
                authority,
                era,
                max_block_size,
            } => {
                let ledger = BlockLedger::new(*authority, "local", *era, *max_block_size)?;
                Ok(Self::Local(LocalBlockSource::new(ledger)))
            }
        }
    }

    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl<C> BlockSource for AuthorityAccessor<C>
where
    C: Connector,
    C::Transport: AuthorityTransport,
{
    async fn allocate_block(&self, request: BlockRequest) -> Result<GdidBlock> {
        match self {
            Self::Remote(source) => source.allocate_block(request).await,
            Self::Local(source) => source.allocate_block(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointAssignment, EndpointRegistry, Error};
    use core::time::Duration;

    #[derive(Clone)]
    struct NeverTransport;

    impl AuthorityTransport for NeverTransport {
        async fn request_block(&self, _request: BlockRequest) -> Result<GdidBlock> {
            Err(Error::AuthorityUnavailable {
                reason: "not wired".into(),
            })
        }
    }

    struct NeverConnector;

    impl Connector for NeverConnector {
        type Transport = NeverTransport;

        fn connect(&self, _assignment: &EndpointAssignment) -> Result<NeverTransport> {
            Ok(NeverTransport)
        }
    }

    fn client() -> Arc<ServiceClient<NeverConnector>> {
        Arc::new(ServiceClient::new(Arc::new(EndpointRegistry::new()), NeverConnector))
    }

    #[tokio::test]
    async fn local_config_serves_in_process() {
        let config = AccessorConfig::Local {
            authority: 4,
            era: 2,
            max_block_size: 100,
        };
        let accessor = AuthorityAccessor::from_config(&config, client()).unwrap();
        assert!(accessor.is_local());

        let block = accessor
            .allocate_block(BlockRequest::new("s", "q", 500))
            .await
            .unwrap();
        assert_eq!((block.authority, block.era, block.block_size), (4, 2, 100));
    }

    #[test]
    fn local_config_rejects_bad_authority() {
        let config = AccessorConfig::Local {
            authority: 16,
            era: 0,
            max_block_size: 100,
        };
        assert!(AuthorityAccessor::from_config(&config, client()).is_err());
    }

    #[tokio::test]
    async fn remote_config_routes_through_the_client() {
        let config = AccessorConfig::Remote {
            remote_address: "sky://gdid".into(),
            contract: "gdid".into(),
            network: "noc".parse().unwrap(),
            binding: "grpc".parse().unwrap(),
            call_timeout_ms: Some(100),
        };
        let accessor = AuthorityAccessor::from_config(&config, client()).unwrap();
        let AuthorityAccessor::Remote(source) = &accessor else {
            panic!("expected a remote accessor");
        };
        assert_eq!(source.call_timeout(), Some(Duration::from_millis(100)));

        // The registry is empty, so there is nowhere to route to.
        let err = accessor
            .allocate_block(BlockRequest::new("s", "q", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Routing { .. }));
    }
}
