use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::{endpoint::EndpointAssignment, error::Result, transport::Connector};

/// A transport handed out by [`TransportPool::acquire`].
///
/// Shared leases point at the pooled transport and releasing them does
/// nothing. Reserved leases own a private transport that no other caller
/// sees; releasing one disposes it through the connector. Use
/// [`TransportPool::lease`] to get a [`PooledLease`] that releases itself
/// when dropped, including when the future holding it is cancelled.
#[derive(Debug)]
#[must_use = "reserved transports must be released"]
pub enum Lease<T> {
    Shared(T),
    Reserved(T),
}

impl<T> Lease<T> {
    pub const fn transport(&self) -> &T {
        match self {
            Self::Shared(t) | Self::Reserved(t) => t,
        }
    }

    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }
}

/// A [`Lease`] that returns itself to its pool on drop.
#[must_use]
pub struct PooledLease<'a, C: Connector> {
    pool: &'a TransportPool<C>,
    lease: Option<Lease<C::Transport>>,
}

impl<C: Connector> PooledLease<'_, C> {
    pub fn transport(&self) -> &C::Transport {
        match &self.lease {
            Some(lease) => lease.transport(),
            None => unreachable!("lease is only taken on drop"),
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.lease.as_ref().is_some_and(Lease::is_reserved)
    }
}

impl<C: Connector> Drop for PooledLease<'_, C> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.pool.release(lease);
        }
    }
}

type Entries<T> = HashMap<EndpointAssignment, T>;

/// Maps endpoint assignments to reusable transports.
///
/// ## Shared acquisition
///
/// A lock-free read against the current pool snapshot; on a miss, a narrow
/// lock is taken, the snapshot is re-checked (another caller may have just
/// published the same entry), the transport is built and a new snapshot is
/// published by atomic swap. There is at most one shared transport per
/// assignment, even when callers race.
///
/// ## Reserved acquisition
///
/// Always builds a fresh transport that never enters the shared snapshot. The
/// caller owns it and must hand it back through [`TransportPool::release`].
///
/// Construction failures propagate unchanged; the pool never retries.
pub struct TransportPool<C: Connector> {
    connector: C,
    shared: ArcSwap<Entries<C::Transport>>,
    publish: Mutex<()>,
}

impl<C: Connector> TransportPool<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            shared: ArcSwap::from_pointee(HashMap::new()),
            publish: Mutex::new(()),
        }
    }

    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Acquires a transport for `assignment`.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Connector::connect`] fails with.
    pub fn acquire(
        &self,
        assignment: &EndpointAssignment,
        reserved: bool,
    ) -> Result<Lease<C::Transport>> {
        if reserved {
            let transport = self.connector.connect(assignment)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(node = assignment.node(), "Reserved transport created");
            return Ok(Lease::Reserved(transport));
        }

        if let Some(transport) = self.shared.load().get(assignment) {
            return Ok(Lease::Shared(transport.clone()));
        }

        let _guard = self.publish.lock();

        let current = self.shared.load_full();
        if let Some(transport) = current.get(assignment) {
            return Ok(Lease::Shared(transport.clone()));
        }

        let transport = self.connector.connect(assignment)?;

        let mut next: Entries<C::Transport> = (*current).clone();
        next.insert(assignment.clone(), transport.clone());
        // Writers are serialized by `publish`, so a plain store cannot lose a
        // concurrent insert.
        self.shared.store(Arc::new(next));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            node = assignment.node(),
            contract = assignment.contract(),
            "Shared transport created"
        );

        Ok(Lease::Shared(transport))
    }

    /// Like [`Self::acquire`], but the lease is released when the guard is
    /// dropped, so a reserved transport is disposed even if the caller is
    /// cancelled mid-call.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Connector::connect`] fails with.
    pub fn lease(
        &self,
        assignment: &EndpointAssignment,
        reserved: bool,
    ) -> Result<PooledLease<'_, C>> {
        let lease = self.acquire(assignment, reserved)?;
        Ok(PooledLease {
            pool: self,
            lease: Some(lease),
        })
    }

    /// Returns a lease to the pool.
    ///
    /// Shared leases are a no-op; reserved ones are disposed.
    pub fn release(&self, lease: Lease<C::Transport>) {
        match lease {
            Lease::Shared(_) => {}
            Lease::Reserved(transport) => {
                self.connector.dispose(transport);
                #[cfg(feature = "tracing")]
                tracing::trace!("Reserved transport disposed");
            }
        }
    }

    /// Number of pooled shared transports.
    pub fn len(&self) -> usize {
        self.shared.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.load().is_empty()
    }

    /// Returns `true` if a shared transport exists for `assignment`.
    pub fn contains(&self, assignment: &EndpointAssignment) -> bool {
        self.shared.load().contains_key(assignment)
    }

    /// Tears the pool down, disposing every shared transport.
    ///
    /// Leases handed out earlier keep their clone of the handle.
    pub fn clear(&self) {
        let retired = {
            let _guard = self.publish.lock();
            self.shared.swap(Arc::new(HashMap::new()))
        };

        // Another reader may still hold the old snapshot for a moment; take
        // ownership if we can, otherwise dispose clones.
        let entries: Vec<C::Transport> = match Arc::try_unwrap(retired) {
            Ok(map) => map.into_values().collect(),
            Err(shared) => shared.values().cloned().collect(),
        };

        #[cfg(feature = "tracing")]
        {
            if !entries.is_empty() {
                tracing::debug!(count = entries.len(), "Disposing pooled transports");
            }
        }

        for transport in entries {
            self.connector.dispose(transport);
        }
    }
}

impl<C: Connector> Drop for TransportPool<C> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, Endpoint, Error};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug)]
    struct MockTransport {
        id: usize,
        node: String,
    }

    #[derive(Default)]
    struct MockConnector {
        built: AtomicUsize,
        disposed: Arc<AtomicUsize>,
    }

    impl Connector for MockConnector {
        type Transport = MockTransport;

        fn connect(&self, assignment: &EndpointAssignment) -> Result<MockTransport> {
            if assignment.node().contains("unreachable") {
                return Err(Error::TransportAcquisition {
                    node: assignment.node().to_owned(),
                    reason: "connection refused".into(),
                });
            }
            let id = self.built.fetch_add(1, Ordering::SeqCst);
            Ok(MockTransport {
                id,
                node: assignment.node().to_owned(),
            })
        }

        fn dispose(&self, _transport: MockTransport) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn assignment(node: &str) -> EndpointAssignment {
        let atom = |s| Atom::encode(s).unwrap();
        let endpoint = Endpoint::new("*", "svc", atom("noc"), atom("grpc"), 0, 0, node).unwrap();
        EndpointAssignment::new(Arc::new(endpoint), "sky://idgen", "svc")
    }

    #[test]
    fn shared_transports_are_reused() {
        let pool = TransportPool::new(MockConnector::default());
        let a = assignment("http://a");

        let first = pool.acquire(&a, false).unwrap();
        let second = pool.acquire(&a, false).unwrap();
        assert!(!first.is_reserved());
        assert_eq!(first.transport().id, second.transport().id);
        assert_eq!(pool.connector().built.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);

        pool.release(first);
        pool.release(second);
        assert_eq!(pool.connector().disposed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn distinct_assignments_get_distinct_transports() {
        let pool = TransportPool::new(MockConnector::default());
        let a = pool.acquire(&assignment("http://a"), false).unwrap();
        let b = pool.acquire(&assignment("http://b"), false).unwrap();
        assert_ne!(a.transport().id, b.transport().id);
        assert_eq!(b.transport().node, "http://b");
        assert_eq!(pool.len(), 2);
        pool.release(a);
        pool.release(b);
    }

    #[test]
    fn reserved_transports_bypass_the_pool() {
        let pool = TransportPool::new(MockConnector::default());
        let a = assignment("http://a");

        let shared = pool.acquire(&a, false).unwrap();
        let reserved = pool.acquire(&a, true).unwrap();
        assert!(reserved.is_reserved());
        assert_ne!(shared.transport().id, reserved.transport().id);
        assert_eq!(pool.len(), 1);

        pool.release(reserved);
        assert_eq!(pool.connector().disposed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
        pool.release(shared);
    }

    #[test]
    fn pooled_leases_release_on_drop() {
        let pool = TransportPool::new(MockConnector::default());
        let a = assignment("http://a");

        {
            let shared = pool.lease(&a, false).unwrap();
            let reserved = pool.lease(&a, true).unwrap();
            assert!(!shared.is_reserved());
            assert!(reserved.is_reserved());
            assert_ne!(shared.transport().id, reserved.transport().id);
        }

        assert_eq!(pool.connector().disposed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn construction_failure_propagates_and_is_not_cached() {
        let pool = TransportPool::new(MockConnector::default());
        let bad = assignment("http://unreachable");

        let err = pool.acquire(&bad, false).unwrap_err();
        assert!(err.is_transient());
        assert!(pool.is_empty());
        assert!(!pool.contains(&bad));
        assert!(pool.acquire(&bad, true).is_err());
    }

    #[test]
    fn racing_acquires_build_one_transport() {
        let pool = TransportPool::new(MockConnector::default());
        let a = assignment("http://a");
        let ids = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..100 {
                        let lease = pool.acquire(&a, false).unwrap();
                        ids.lock().unwrap().push(lease.transport().id);
                        pool.release(lease);
                    }
                });
            }
        });

        assert_eq!(pool.connector().built.load(Ordering::SeqCst), 1);
        assert!(ids.into_inner().unwrap().iter().all(|&id| id == 0));
    }

    #[test]
    fn teardown_disposes_shared_transports() {
        let disposed = {
            let pool = TransportPool::new(MockConnector::default());
            let disposed = Arc::clone(&pool.connector().disposed);
            for node in ["http://a", "http://b", "http://c"] {
                let lease = pool.acquire(&assignment(node), false).unwrap();
                pool.release(lease);
            }
            pool.clear();
            assert!(pool.is_empty());
            assert_eq!(disposed.load(Ordering::SeqCst), 3);

            let lease = pool.acquire(&assignment("http://d"), false).unwrap();
            pool.release(lease);
            disposed
        };
        // Dropping the pool disposes what was left.
        assert_eq!(disposed.load(Ordering::SeqCst), 4);
    }
}
