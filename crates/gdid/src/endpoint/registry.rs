use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::endpoint::Endpoint;

/// An immutable view of the registered endpoints, in registration order.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    version: u64,
    endpoints: Vec<Arc<Endpoint>>,
}

impl RegistrySnapshot {
    /// Monotonic change counter. Every mutation publishes a higher version.
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Handle returned by [`EndpointRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Arc<RegistrySnapshot>) + Send + Sync>;

#[derive(Default)]
struct Writer {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

/// Source of truth for the set of known remote endpoints.
///
/// Writers are serialized by a single lock; readers load the current
/// [`RegistrySnapshot`] without locking. Every effective mutation publishes a
/// new snapshot and then notifies subscribers synchronously, on the mutating
/// thread, before the mutating call returns.
///
/// Listeners run after the writer lock is released, so they may read the
/// registry. Two racing writers can deliver notifications out of order;
/// listeners compare [`RegistrySnapshot::version`] to discard stale ones.
pub struct EndpointRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
    writer: Mutex<Writer>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            writer: Mutex::new(Writer::default()),
        }
    }

    /// Creates a registry pre-populated with `endpoints`, in order.
    pub fn with_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let registry = Self::new();
        registry.register_all(endpoints);
        registry
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Returns the version of the current snapshot.
    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Registers an endpoint. Returns `false` (and fires no event) if an equal
    /// endpoint is already registered.
    pub fn register(&self, endpoint: Endpoint) -> bool {
        self.register_all([endpoint]) > 0
    }

    /// Registers a batch of endpoints under one change event. Returns the
    /// number of endpoints actually added.
    pub fn register_all(&self, endpoints: impl IntoIterator<Item = Endpoint>) -> usize {
        self.mutate(|current| {
            let mut added = 0;
            for endpoint in endpoints {
                if !current.iter().any(|e| **e == endpoint) {
                    current.push(Arc::new(endpoint));
                    added += 1;
                }
            }
            added
        })
    }

    /// Removes an endpoint. Returns `false` if it was not registered.
    pub fn unregister(&self, endpoint: &Endpoint) -> bool {
        self.mutate(|current| {
            let before = current.len();
            current.retain(|e| **e != *endpoint);
            before - current.len()
        }) > 0
    }

    /// Replaces the whole endpoint set under one change event.
    pub fn replace_all(&self, endpoints: impl IntoIterator<Item = Endpoint>) {
        let endpoints: Vec<Arc<Endpoint>> = endpoints.into_iter().map(Arc::new).collect();
        self.mutate(move |current| {
            *current = endpoints;
            // Always publish: callers use replace to force a cold cache.
            1
        });
    }

    /// Registers a change listener.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Arc<RegistrySnapshot>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut writer = self.writer.lock();
        let id = SubscriptionId(writer.next_subscription);
        writer.next_subscription += 1;
        writer.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a change listener. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut writer = self.writer.lock();
        let before = writer.listeners.len();
        writer.listeners.retain(|(sid, _)| *sid != id);
        writer.listeners.len() != before
    }

    /// Number of registered change listeners.
    pub fn listener_count(&self) -> usize {
        self.writer.lock().listeners.len()
    }

    /// Applies `f` to a copy of the endpoint list and, if it reports a change,
    /// publishes the copy and notifies listeners.
    fn mutate(&self, f: impl FnOnce(&mut Vec<Arc<Endpoint>>) -> usize) -> usize {
        let (changed, published, listeners) = {
            let writer = self.writer.lock();
            let current = self.snapshot.load();
            let mut endpoints = current.endpoints.clone();
            let changed = f(&mut endpoints);
            if changed == 0 {
                return 0;
            }

            let published = Arc::new(RegistrySnapshot {
                version: current.version + 1,
                endpoints,
            });
            self.snapshot.store(Arc::clone(&published));

            let listeners: Vec<Listener> =
                writer.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (changed, published, listeners)
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            version = published.version,
            endpoints = published.len(),
            "Endpoint registry changed"
        );

        for listener in listeners {
            listener(&published);
        }

        changed
    }
}
