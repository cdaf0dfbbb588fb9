use std::sync::Arc;

use portable_atomic::{AtomicU64, Ordering};

use crate::gdid::GdidBlock;

/// Allocation state for one `(scope, sequence)`: the block being served and
/// the next free offset inside it.
///
/// `next_offset` only ever grows and never passes `block_size`. Once the block
/// is drained the cursor is replaced, never rewound.
pub(crate) struct LocalCursor {
    block: Arc<GdidBlock>,
    /// Size the refill that produced this cursor asked for.
    requested: u64,
    #[cfg(feature = "cache-padded")]
    next_offset: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    next_offset: AtomicU64,
}

impl LocalCursor {
    pub(crate) fn new(block: GdidBlock, requested: u64) -> Self {
        Self {
            block: Arc::new(block),
            requested,
            #[cfg(feature = "cache-padded")]
            next_offset: crossbeam_utils::CachePadded::new(AtomicU64::new(0)),
            #[cfg(not(feature = "cache-padded"))]
            next_offset: AtomicU64::new(0),
        }
    }

    pub(crate) const fn block(&self) -> &Arc<GdidBlock> {
        &self.block
    }

    pub(crate) const fn requested(&self) -> u64 {
        self.requested
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.block
            .block_size
            .saturating_sub(self.next_offset.load(Ordering::Acquire))
    }

    /// Claims `count` consecutive offsets, or nothing if they do not all fit.
    pub(crate) fn try_take(&self, count: u64) -> Option<u64> {
        let size = self.block.block_size;
        self.next_offset
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |offset| {
                offset.checked_add(count).filter(|&end| end <= size)
            })
            .ok()
    }
}
