use core::ops::Range;
use std::sync::Arc;

use crate::gdid::{Gdid, GdidBlock};

/// A run of consecutive ids claimed from one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    block: Arc<GdidBlock>,
    offset: u64,
    count: u64,
}

impl Allocation {
    pub(crate) const fn new(block: Arc<GdidBlock>, offset: u64, count: u64) -> Self {
        Self {
            block,
            offset,
            count,
        }
    }

    /// The block the ids were taken from.
    pub fn block(&self) -> &GdidBlock {
        &self.block
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    pub fn first_counter(&self) -> u64 {
        self.block.start_counter_inclusive + self.offset
    }

    /// Absolute counter values covered by this allocation.
    pub fn counters(&self) -> Range<u64> {
        let first = self.first_counter();
        first..first + self.count
    }

    pub fn first(&self) -> Gdid {
        Gdid::new_unchecked(self.block.era, self.block.authority, self.first_counter())
    }

    pub fn last(&self) -> Gdid {
        Gdid::new_unchecked(
            self.block.era,
            self.block.authority,
            self.first_counter() + self.count - 1,
        )
    }

    pub fn gdids(&self) -> impl Iterator<Item = Gdid> + '_ {
        self.counters()
            .map(|counter| Gdid::new_unchecked(self.block.era, self.block.authority, counter))
    }
}
