use core::{future::Future, time::Duration};
use std::sync::Arc;

use crate::{
    endpoint::EndpointRegistry,
    error::{Error, Result},
    resolver::{RequestKey, ShardKey, ShardResolver},
    transport::{Connector, TransportPool},
};

/// Per-call options for [`ServiceClient::call_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Use a private transport per attempt instead of the shared one.
    pub reserved: bool,
    /// Deadline for the whole call, failover included.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    #[must_use]
    pub const fn reserved(mut self) -> Self {
        self.reserved = true;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Client facade over a sharded cluster.
///
/// A call resolves the shard table for its [`RequestKey`], picks the shard
/// serving the caller's shard key, then walks that shard's endpoints in
/// priority order. Each attempt acquires a transport and runs the unit of
/// work against it. Transient failures ([`Error::is_transient`]) advance to
/// the next endpoint; anything else is returned immediately. When every
/// endpoint of the shard fails, the last failure is returned.
///
/// Failover never crosses shards: another shard holds different data.
pub struct ServiceClient<C: Connector> {
    resolver: ShardResolver,
    pool: TransportPool<C>,
}

impl<C: Connector> ServiceClient<C> {
    pub fn new(registry: Arc<EndpointRegistry>, connector: C) -> Self {
        Self {
            resolver: ShardResolver::new(registry),
            pool: TransportPool::new(connector),
        }
    }

    pub const fn resolver(&self) -> &ShardResolver {
        &self.resolver
    }

    pub const fn pool(&self) -> &TransportPool<C> {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        self.resolver.registry()
    }

    /// Runs `work` against the shard serving `shard_key`, over shared
    /// transports, with failover.
    ///
    /// # Errors
    ///
    /// - [`Error::Routing`] if no shard matches.
    /// - The last transient error if every endpoint of the shard failed.
    /// - Any non-transient error returned by `work`, unchanged.
    pub async fn call<K, F, Fut, R>(&self, key: &RequestKey, shard_key: &K, work: F) -> Result<R>
    where
        K: ShardKey + ?Sized,
        F: FnMut(C::Transport) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.call_with(key, shard_key, CallOptions::default(), work).await
    }

    /// Like [`Self::call`], but every attempt runs on a reserved transport
    /// that is disposed as soon as the attempt finishes.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn call_reserved<K, F, Fut, R>(
        &self,
        key: &RequestKey,
        shard_key: &K,
        work: F,
    ) -> Result<R>
    where
        K: ShardKey + ?Sized,
        F: FnMut(C::Transport) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.call_with(key, shard_key, CallOptions::default().reserved(), work)
            .await
    }

    /// Runs `work` with explicit [`CallOptions`].
    ///
    /// # Errors
    ///
    /// See [`Self::call`]. Additionally returns [`Error::AuthorityTimeout`]
    /// when `options.timeout` elapses; a timeout is not retried.
    pub async fn call_with<K, F, Fut, R>(
        &self,
        key: &RequestKey,
        shard_key: &K,
        options: CallOptions,
        work: F,
    ) -> Result<R>
    where
        K: ShardKey + ?Sized,
        F: FnMut(C::Transport) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let attempt = self.failover(key, shard_key, options.reserved, work);
        match options.timeout {
            None => attempt.await,
            Some(timeout) => tokio::time::timeout(timeout, attempt)
                .await
                .unwrap_or(Err(Error::AuthorityTimeout { timeout })),
        }
    }

    async fn failover<K, F, Fut, R>(
        &self,
        key: &RequestKey,
        shard_key: &K,
        reserved: bool,
        mut work: F,
    ) -> Result<R>
    where
        K: ShardKey + ?Sized,
        F: FnMut(C::Transport) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let (table, position) = self.resolver.resolve_shard(key, shard_key)?;
        let shard = &table.shards()[position];

        let mut last_error = None;
        for assignment in shard.assignments() {
            let lease = match self.pool.lease(assignment, reserved) {
                Ok(lease) => lease,
                Err(e) if e.is_transient() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        node = assignment.node(),
                        shard = shard.index(),
                        error = %e,
                        "Transport acquisition failed, failing over"
                    );
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Dropping the guard releases the lease, on cancellation too.
            let outcome = work(lease.transport().clone()).await;
            drop(lease);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        node = assignment.node(),
                        shard = shard.index(),
                        error = %e,
                        "Call failed, failing over"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::routing(format!("shard {} has no endpoints", shard.index()))
        }))
    }
}
