use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::{
    endpoint::{EndpointRegistry, SubscriptionId},
    error::{Error, Result},
    resolver::{RequestKey, Shard, ShardKey, ShardTable},
};

/// Memoized resolutions for one registry version. `None` records a request
/// that matched nothing.
#[derive(Default)]
struct Memo {
    version: u64,
    tables: HashMap<RequestKey, Option<Arc<ShardTable>>>,
}

impl Memo {
    fn empty(version: u64) -> Self {
        Self {
            version,
            tables: HashMap::new(),
        }
    }
}

/// Resolves request tuples into [`ShardTable`]s and memoizes the results.
///
/// ## Cache discipline
///
/// - Hits read the current memo table through an atomic load, without any
///   lock.
/// - Misses compute under a narrow lock and publish a *new* table (a copy of
///   the old one plus the new entry) via an atomic swap. The live table is
///   never mutated in place.
/// - A registry change swaps in an empty table for the new registry version.
///   Readers in flight keep the table they loaded; no reader is blocked.
///
/// Each memo table is tagged with the registry version it was computed from
/// and a result is only published into a table of the same version, so a
/// slow miss can never reintroduce a stale entry after an invalidation.
pub struct ShardResolver {
    registry: Arc<EndpointRegistry>,
    memo: Arc<ArcSwap<Memo>>,
    miss: Mutex<()>,
    subscription: SubscriptionId,
}

impl ShardResolver {
    /// Creates a resolver over `registry` and subscribes to its changes.
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        let memo = Arc::new(ArcSwap::from_pointee(Memo::empty(registry.version())));

        let subscription = {
            let memo = Arc::clone(&memo);
            registry.subscribe(move |snapshot| {
                let version = snapshot.version();
                memo.rcu(|current| {
                    if current.version >= version {
                        Arc::clone(current)
                    } else {
                        Arc::new(Memo::empty(version))
                    }
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(version, "Shard resolution cache invalidated");
            })
        };

        Self {
            registry,
            memo,
            miss: Mutex::new(()),
            subscription,
        }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Resolves `key` into a shard table, or `None` if no endpoint matches.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub fn resolve(&self, key: &RequestKey) -> Option<Arc<ShardTable>> {
        if let Some(hit) = self.memo.load().tables.get(key) {
            return hit.clone();
        }

        let _guard = self.miss.lock();

        // Another thread may have published this entry while we waited.
        if let Some(hit) = self.memo.load().tables.get(key) {
            return hit.clone();
        }

        let snapshot = self.registry.snapshot();
        let table = ShardTable::build(key, snapshot.endpoints()).map(Arc::new);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            version = snapshot.version(),
            shards = table.as_ref().map_or(0, |t| t.len()),
            "Shard resolution cache miss"
        );

        self.memo.rcu(|current| {
            if current.version > snapshot.version() {
                // Invalidated while computing: do not publish stale data.
                return Arc::clone(current);
            }
            let mut next = if current.version == snapshot.version() {
                Memo {
                    version: current.version,
                    tables: current.tables.clone(),
                }
            } else {
                Memo::empty(snapshot.version())
            };
            next.tables.insert(key.clone(), table.clone());
            Arc::new(next)
        });

        table
    }

    /// Resolves `key` and selects the shard serving `shard_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] if nothing matches `key` or the selected
    /// shard has no endpoints. There is no fallback endpoint.
    pub fn resolve_shard<K: ShardKey + ?Sized>(
        &self,
        key: &RequestKey,
        shard_key: &K,
    ) -> Result<(Arc<ShardTable>, usize)> {
        let table = self.resolve(key).ok_or_else(|| {
            Error::routing(format!(
                "no endpoint serves `{}` at `{}` on {}/{}",
                key.contract, key.remote_address, key.network, key.binding
            ))
        })?;

        let position = table
            .position_for(shard_key)
            .filter(|&i| !table.shards()[i].is_empty())
            .ok_or_else(|| Error::routing(format!("empty shard for `{}`", key.contract)))?;

        Ok((table, position))
    }

    /// Convenience wrapper over [`Self::resolve_shard`] returning a clone of
    /// the selected shard.
    pub fn shard_for<K: ShardKey + ?Sized>(&self, key: &RequestKey, shard_key: &K) -> Result<Shard> {
        let (table, position) = self.resolve_shard(key, shard_key)?;
        Ok(table.shards()[position].clone())
    }

    /// Drops every memoized resolution.
    pub fn invalidate(&self) {
        let version = self.registry.version();
        self.memo.rcu(|current| Memo::empty(version.max(current.version)));
    }

    /// Number of memoized request keys.
    pub fn cached_len(&self) -> usize {
        self.memo.load().tables.len()
    }
}

impl Drop for ShardResolver {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, Endpoint};

    fn atom(s: &str) -> Atom {
        Atom::encode(s).unwrap()
    }

    fn ep(shard: u32, order: i32, node: &str) -> Endpoint {
        Endpoint::new("sky://*", "svc", atom("noc"), atom("grpc"), shard, order, node).unwrap()
    }

    fn key() -> RequestKey {
        RequestKey::new("sky://idgen", "svc", atom("noc"), atom("grpc"))
    }

    fn four_endpoints() -> Arc<EndpointRegistry> {
        Arc::new(EndpointRegistry::with_endpoints([
            ep(0, 0, "http://s0-a"),
            ep(0, 1, "http://s0-b"),
            ep(1, 0, "http://s1-a"),
            ep(1, 1, "http://s1-b"),
        ]))
    }

    #[test]
    fn resolution_is_memoized() {
        let resolver = ShardResolver::new(four_endpoints());
        assert_eq!(resolver.cached_len(), 0);

        let first = resolver.resolve(&key()).unwrap();
        let second = resolver.resolve(&key()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn shard_selection_is_deterministic() {
        let resolver = ShardResolver::new(four_endpoints());
        for k in 0_u64..256 {
            let (_, a) = resolver.resolve_shard(&key(), &k).unwrap();
            let (_, b) = resolver.resolve_shard(&key(), &k).unwrap();
            assert_eq!(a, b);
        }

        let shard = resolver.shard_for(&key(), &0_u64).unwrap();
        assert_eq!(shard.index(), 0);
        assert_eq!(shard.assignments()[0].node(), "http://s0-a");
    }

    #[test]
    fn unmatched_requests_are_routing_errors() {
        let resolver = ShardResolver::new(four_endpoints());
        let missing = RequestKey::new("sky://idgen", "ledger", atom("noc"), atom("grpc"));

        assert!(resolver.resolve(&missing).is_none());
        assert!(matches!(
            resolver.resolve_shard(&missing, &0_u64),
            Err(Error::Routing { .. })
        ));
        // Negative results are memoized too.
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn registry_change_invalidates_cache() {
        let registry = four_endpoints();
        let resolver = ShardResolver::new(Arc::clone(&registry));

        let before = resolver.resolve(&key()).unwrap();
        assert_eq!(before.len(), 2);

        registry.register(ep(2, 0, "http://s2-a"));
        assert_eq!(resolver.cached_len(), 0);

        let after = resolver.resolve(&key()).unwrap();
        assert_eq!(after.len(), 3);
        // The old snapshot handed out earlier is unchanged.
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn negative_result_is_replaced_after_registration() {
        let registry = Arc::new(EndpointRegistry::new());
        let resolver = ShardResolver::new(Arc::clone(&registry));
        assert!(resolver.resolve(&key()).is_none());

        registry.register(ep(0, 0, "http://late"));
        let table = resolver.resolve(&key()).unwrap();
        assert_eq!(table.shards()[0].assignments()[0].node(), "http://late");
    }

    #[test]
    fn manual_invalidate_empties_cache() {
        let resolver = ShardResolver::new(four_endpoints());
        resolver.resolve(&key());
        resolver.invalidate();
        assert_eq!(resolver.cached_len(), 0);
        assert!(resolver.resolve(&key()).is_some());
    }

    #[test]
    fn dropping_resolver_unsubscribes() {
        let registry = four_endpoints();
        {
            let _resolver = ShardResolver::new(Arc::clone(&registry));
            assert_eq!(registry.listener_count(), 1);
        }
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn readers_never_observe_mixed_snapshots() {
        let registry = four_endpoints();
        let resolver = ShardResolver::new(Arc::clone(&registry));

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for k in 0_u64..2_000 {
                        let table = resolver.resolve(&key()).unwrap();
                        // Every published table is either the 2-shard or the
                        // 3-shard variant and is internally complete.
                        assert!(table.len() == 2 || table.len() == 3);
                        for shard in table.shards() {
                            assert_eq!(shard.assignments().len(), 2);
                        }
                        let _ = table.select(&k);
                    }
                });
            }
            s.spawn(|| {
                let base = [
                    ep(0, 0, "http://s0-a"),
                    ep(0, 1, "http://s0-b"),
                    ep(1, 0, "http://s1-a"),
                    ep(1, 1, "http://s1-b"),
                ];
                for i in 0..50 {
                    let mut next = base.to_vec();
                    if i % 2 == 0 {
                        next.extend([ep(2, 0, "http://s2-a"), ep(2, 1, "http://s2-b")]);
                    }
                    registry.replace_all(next);
                }
            });
        });
    }
}
