use crate::{
    authority::BlockSource,
    error::Result,
    gdid::{BlockLedger, BlockRequest, GdidBlock},
};

/// A [`BlockSource`] served entirely in-process from a [`BlockLedger`].
///
/// Blocks are unique within this process only. Two processes running a local
/// source with the same authority and era will hand out the same ids; use it
/// for tests and single-process tools.
#[derive(Debug)]
pub struct LocalBlockSource {
    ledger: BlockLedger,
}

impl LocalBlockSource {
    pub const fn new(ledger: BlockLedger) -> Self {
        Self { ledger }
    }

    pub const fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }
}

impl BlockSource for LocalBlockSource {
    async fn allocate_block(&self, request: BlockRequest) -> Result<GdidBlock> {
        self.ledger.issue(&request)
    }
}
