use std::{collections::HashMap, time::SystemTime};

use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    gdid::{BlockRequest, Gdid, GdidBlock},
};

/// In-process counter table that carves non-overlapping blocks out of one
/// authority's counter space, keyed by `scope::sequence`.
///
/// The ledger holds no durable state. Anything that restarts with a fresh
/// ledger must also move to a new era, otherwise it will re-issue counters
/// it already handed out.
#[derive(Debug)]
pub struct BlockLedger {
    authority: u8,
    authority_host: String,
    era: u32,
    max_block_size: u64,
    counters: Mutex<HashMap<String, u64>>,
}

impl BlockLedger {
    /// Creates an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `authority` exceeds
    /// [`Gdid::MAX_AUTHORITY`] or `max_block_size` is zero.
    pub fn new(
        authority: u8,
        authority_host: impl Into<String>,
        era: u32,
        max_block_size: u64,
    ) -> Result<Self> {
        if authority > Gdid::MAX_AUTHORITY {
            return Err(Error::invalid_request(format!(
                "authority {authority} exceeds {}",
                Gdid::MAX_AUTHORITY
            )));
        }
        if max_block_size == 0 {
            return Err(Error::invalid_request("max block size must be greater than 0"));
        }
        Ok(Self {
            authority,
            authority_host: authority_host.into(),
            era,
            max_block_size,
            counters: Mutex::new(HashMap::new()),
        })
    }

    pub const fn authority(&self) -> u8 {
        self.authority
    }

    pub fn authority_host(&self) -> &str {
        &self.authority_host
    }

    pub const fn era(&self) -> u32 {
        self.era
    }

    pub const fn max_block_size(&self) -> u64 {
        self.max_block_size
    }

    /// Positions `scope::sequence` so the next block starts at `counter`.
    /// Counters never move backwards; a lower value is ignored.
    pub fn seed(&self, scope: &str, sequence: &str, counter: u64) {
        let mut counters = self.counters.lock();
        let next = counters.entry(Self::key(scope, sequence)).or_insert(0);
        *next = (*next).max(counter);
    }

    /// The next counter `scope::sequence` would hand out.
    pub fn peek(&self, scope: &str, sequence: &str) -> u64 {
        self.counters
            .lock()
            .get(&Self::key(scope, sequence))
            .copied()
            .unwrap_or(0)
    }

    /// Reserves the next block for `request`.
    ///
    /// The block is capped at [`Self::max_block_size`] and at whatever is
    /// left of the counter space, so it may be smaller than requested.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if the request is invalid.
    /// - [`Error::EraExhausted`] once the counter space of the sequence is
    ///   used up for this era.
    pub fn issue(&self, request: &BlockRequest) -> Result<GdidBlock> {
        request.validate()?;

        let (start, size) = {
            let mut counters = self.counters.lock();
            let next = counters
                .entry(Self::key(&request.scope_name, &request.sequence_name))
                .or_insert(0);

            let start = *next;
            if start > Gdid::MAX_COUNTER {
                return Err(Error::EraExhausted {
                    scope: request.scope_name.clone(),
                    sequence: request.sequence_name.clone(),
                });
            }

            let room = Gdid::MAX_COUNTER - start + 1;
            let size = request.block_size.min(self.max_block_size).min(room);
            *next = start + size;
            (start, size)
        };

        Ok(GdidBlock {
            scope_name: request.scope_name.clone(),
            sequence_name: request.sequence_name.clone(),
            authority: self.authority,
            authority_host: self.authority_host.clone(),
            era: self.era,
            start_counter_inclusive: start,
            block_size: size,
            server_utc: SystemTime::now(),
        })
    }

    fn key(scope: &str, sequence: &str) -> String {
        format!("{scope}::{sequence}")
    }
}
