use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    allocator::{Allocation, LocalCursor},
    authority::BlockSource,
    config::AllocatorConfig,
    error::{Error, Result},
    gdid::{BlockRequest, Gdid, GdidBlock},
};

/// scope -> sequence -> cursor, so lookups never allocate.
type Cursors = HashMap<String, HashMap<String, Arc<LocalCursor>>>;
type SequenceKey = (String, String);
type Refill = Shared<BoxFuture<'static, Result<Arc<LocalCursor>>>>;

/// Hands out GDIDs from locally cached blocks, refilling from a
/// [`BlockSource`] when a block runs dry.
///
/// Each `(scope, sequence)` moves through three states:
///
/// - **Empty**: no cursor. The next allocation starts a refill.
/// - **Refilling**: exactly one block request is in flight. Every caller for
///   the same key attaches to it and shares its outcome. Success installs a
///   fresh cursor; failure drops back to Empty and every attached caller gets
///   the same error.
/// - **Ready**: allocations claim offsets from the cursor with a single atomic
///   update and never touch a lock.
///
/// A request is always served from one block. If it does not fit in what is
/// left of the current block, the remainder is abandoned and a refill is
/// forced first. Requests are capped at [`AllocatorConfig::max_block_size`];
/// keep that at or below the authority's own cap.
///
/// Cloning is cheap and clones share cursors.
pub struct GdidAllocator<S: BlockSource> {
    inner: Arc<Inner<S>>,
}

impl<S: BlockSource> Clone for GdidAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    source: S,
    config: AllocatorConfig,
    cursors: ArcSwap<Cursors>,
    /// In-flight refills. Also serializes every write to `cursors`.
    pending: Mutex<HashMap<SequenceKey, Refill>>,
}

impl<S: BlockSource> GdidAllocator<S> {
    /// Creates an allocator with the default [`AllocatorConfig`].
    pub fn new(source: S) -> Self {
        Self::build(source, AllocatorConfig::default())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `config` does not validate.
    pub fn with_config(source: S, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: S, config: AllocatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                cursors: ArcSwap::from_pointee(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.inner.config
    }

    pub fn max_block_size(&self) -> u64 {
        self.inner.config.max_block_size
    }

    /// Claims `count` consecutive ids for `scope::sequence`, refilling first
    /// if the current block cannot hold them.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `count` is zero, above
    ///   [`Self::max_block_size`], or larger than the blocks the source is
    ///   willing to issue.
    /// - Any error from the refill, shared with every caller attached to it.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn allocate(&self, scope: &str, sequence: &str, count: u64) -> Result<Allocation> {
        self.check_count(count)?;

        loop {
            let observed = self.inner.cursor(scope, sequence);
            if let Some(cursor) = &observed {
                if let Some(offset) = cursor.try_take(count) {
                    return Ok(Allocation::new(Arc::clone(cursor.block()), offset, count));
                }
            }

            let fresh = self.inner.refill(scope, sequence, count, observed.as_ref()).await?;
            if let Some(offset) = fresh.try_take(count) {
                return Ok(Allocation::new(Arc::clone(fresh.block()), offset, count));
            }

            // A block issued for at least `count` ids that still cannot hold
            // them was capped by the source; another refill would be too.
            if fresh.block().block_size < count && fresh.requested() >= count {
                return Err(Error::invalid_request(format!(
                    "source issued {} ids for a request of {count}",
                    fresh.block().block_size
                )));
            }
        }
    }

    /// Claims one id.
    ///
    /// # Errors
    ///
    /// See [`Self::allocate`].
    pub async fn allocate_one(&self, scope: &str, sequence: &str) -> Result<Gdid> {
        self.allocate(scope, sequence, 1).await.map(|a| a.first())
    }

    /// Claims `count` ids only if the current block can hold them, without
    /// ever refilling.
    pub fn try_allocate(&self, scope: &str, sequence: &str, count: u64) -> Option<Allocation> {
        if count == 0 {
            return None;
        }
        let cursor = self.inner.cursor(scope, sequence)?;
        let offset = cursor.try_take(count)?;
        Some(Allocation::new(Arc::clone(cursor.block()), offset, count))
    }

    /// Requests a block straight from the source, bypassing local cursors.
    ///
    /// # Errors
    ///
    /// Whatever the source fails with, or [`Error::MalformedBlock`] if the
    /// block does not answer the request.
    pub async fn allocate_block(&self, request: BlockRequest) -> Result<GdidBlock> {
        request.validate()?;
        let block = self.inner.source.allocate_block(request.clone()).await?;
        block.validate_for(&request)?;
        Ok(block)
    }

    /// Ids left in the current block, or `None` if `scope::sequence` is Empty.
    pub fn cursor_remaining(&self, scope: &str, sequence: &str) -> Option<u64> {
        self.inner.cursor(scope, sequence).map(|c| c.remaining())
    }

    /// Drops the cursor for `scope::sequence`; the next allocation refills.
    /// Returns `true` if a cursor was present.
    pub fn invalidate(&self, scope: &str, sequence: &str) -> bool {
        let _pending = self.inner.pending.lock();
        self.inner.remove_cursor(scope, sequence)
    }

    /// Drops every cursor.
    pub fn invalidate_all(&self) {
        let _pending = self.inner.pending.lock();
        self.inner.cursors.store(Arc::new(HashMap::new()));
        #[cfg(feature = "tracing")]
        tracing::debug!("All cursors invalidated");
    }

    fn check_count(&self, count: u64) -> Result<()> {
        let max = self.inner.config.max_block_size;
        if count == 0 || count > max {
            return Err(Error::invalid_request(format!(
                "count {count} must be in 1..={max}"
            )));
        }
        Ok(())
    }
}

impl<S: BlockSource> Inner<S> {
    fn cursor(&self, scope: &str, sequence: &str) -> Option<Arc<LocalCursor>> {
        self.cursors
            .load()
            .get(scope)
            .and_then(|sequences| sequences.get(sequence))
            .cloned()
    }

    /// Returns a cursor newer than `observed`, joining or starting the single
    /// refill for the key.
    async fn refill(
        self: &Arc<Self>,
        scope: &str,
        sequence: &str,
        count: u64,
        observed: Option<&Arc<LocalCursor>>,
    ) -> Result<Arc<LocalCursor>> {
        let key = (scope.to_owned(), sequence.to_owned());

        let flight = {
            let mut pending = self.pending.lock();
            if let Some(flight) = pending.get(&key) {
                flight.clone()
            } else {
                // Someone may have installed a cursor since the caller looked.
                if let Some(current) = self.cursor(scope, sequence) {
                    if observed.is_none_or(|seen| !Arc::ptr_eq(seen, &current)) {
                        return Ok(current);
                    }
                }

                let flight = Arc::clone(self).start_refill(key.clone(), count);
                pending.insert(key, flight.clone());
                flight
            }
        };

        flight.await
    }

    fn start_refill(self: Arc<Self>, key: SequenceKey, count: u64) -> Refill {
        let size = count
            .max(self.config.default_block_size)
            .min(self.config.max_block_size);
        let request = BlockRequest::new(key.0.as_str(), key.1.as_str(), size)
            .with_vicinity(self.config.vicinity);

        async move {
            #[cfg(feature = "tracing")]
            tracing::debug!(scope = %key.0, sequence = %key.1, size, "Refilling cursor");

            let outcome = self.fetch(request).await;
            self.settle(&key, &outcome);
            outcome
        }
        .boxed()
        .shared()
    }

    async fn fetch(&self, request: BlockRequest) -> Result<Arc<LocalCursor>> {
        let call = self.source.allocate_block(request.clone());
        let block = match self.config.refill_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .unwrap_or(Err(Error::AuthorityTimeout { timeout }))?,
            None => call.await?,
        };
        block.validate_for(&request)?;
        Ok(Arc::new(LocalCursor::new(block, request.block_size)))
    }

    /// Publishes the outcome of a refill and retires its pending entry.
    fn settle(&self, key: &SequenceKey, outcome: &Result<Arc<LocalCursor>>) {
        let mut pending = self.pending.lock();
        match outcome {
            Ok(cursor) => {
                let mut next = Cursors::clone(&self.cursors.load());
                next.entry(key.0.clone())
                    .or_default()
                    .insert(key.1.clone(), Arc::clone(cursor));
                self.cursors.store(Arc::new(next));

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    scope = %key.0,
                    sequence = %key.1,
                    start = cursor.block().start_counter_inclusive,
                    size = cursor.block().block_size,
                    "Cursor refilled"
                );
            }
            Err(_e) => {
                self.remove_cursor(&key.0, &key.1);

                #[cfg(feature = "tracing")]
                tracing::warn!(scope = %key.0, sequence = %key.1, error = %_e, "Refill failed");
            }
        }
        pending.remove(key);
    }

    /// Caller must hold `pending`.
    fn remove_cursor(&self, scope: &str, sequence: &str) -> bool {
        let current = self.cursors.load_full();
        let present = current
            .get(scope)
            .is_some_and(|sequences| sequences.contains_key(sequence));
        if present {
            let mut next = Cursors::clone(&current);
            if let Some(sequences) = next.get_mut(scope) {
                sequences.remove(sequence);
                if sequences.is_empty() {
                    next.remove(scope);
                }
            }
            self.cursors.store(Arc::new(next));
        }
        present
    }
}
