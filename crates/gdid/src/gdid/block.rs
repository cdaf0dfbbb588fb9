use std::time::SystemTime;

use crate::{
    error::{Error, Result},
    gdid::Gdid,
};

/// Vicinity value meaning "no locality preference".
pub const DEFAULT_VICINITY: u64 = u64::MAX;

/// Request for a new block of counters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRequest {
    pub scope_name: String,
    pub sequence_name: String,
    pub block_size: u64,
    /// Locality hint the authority may use to pick a nearby shard.
    pub vicinity: u64,
}

impl BlockRequest {
    pub fn new(scope_name: impl Into<String>, sequence_name: impl Into<String>, block_size: u64) -> Self {
        Self {
            scope_name: scope_name.into(),
            sequence_name: sequence_name.into(),
            block_size,
            vicinity: DEFAULT_VICINITY,
        }
    }

    #[must_use]
    pub const fn with_vicinity(mut self, vicinity: u64) -> Self {
        self.vicinity = vicinity;
        self
    }

    /// Checks that names are present and the size is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.scope_name.trim().is_empty() {
            return Err(Error::invalid_request("scope name must not be blank"));
        }
        if self.sequence_name.trim().is_empty() {
            return Err(Error::invalid_request("sequence name must not be blank"));
        }
        if self.block_size == 0 {
            return Err(Error::invalid_request("block size must be greater than 0"));
        }
        Ok(())
    }
}

/// A contiguous, exclusively reserved range of counter values issued by an
/// authority: `[start_counter_inclusive, start_counter_inclusive + block_size)`.
///
/// Two blocks issued for the same `(scope, sequence, authority, era)` never
/// overlap.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GdidBlock {
    pub scope_name: String,
    pub sequence_name: String,
    pub authority: u8,
    pub authority_host: String,
    pub era: u32,
    pub start_counter_inclusive: u64,
    pub block_size: u64,
    pub server_utc: SystemTime,
}

impl GdidBlock {
    /// Rejects blocks that cannot be served safely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedBlock`] if the size is zero, the authority is
    /// out of range, or the range runs past [`Gdid::MAX_COUNTER`].
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::malformed("block size is 0"));
        }
        if self.authority > Gdid::MAX_AUTHORITY {
            return Err(Error::malformed(format!(
                "authority {} exceeds {}",
                self.authority,
                Gdid::MAX_AUTHORITY
            )));
        }
        match self.start_counter_inclusive.checked_add(self.block_size) {
            Some(end) if end <= Gdid::MAX_COUNTER + 1 => Ok(()),
            _ => Err(Error::malformed(format!(
                "range {}+{} overflows the counter space",
                self.start_counter_inclusive, self.block_size
            ))),
        }
    }

    /// Validates the block and checks that it answers `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedBlock`] if the block is invalid, names a
    /// different scope or sequence, or is larger than requested.
    pub fn validate_for(&self, request: &BlockRequest) -> Result<()> {
        self.validate()?;
        if self.scope_name != request.scope_name || self.sequence_name != request.sequence_name {
            return Err(Error::malformed(format!(
                "block for {}::{} does not answer {}::{}",
                self.scope_name, self.sequence_name, request.scope_name, request.sequence_name
            )));
        }
        if self.block_size > request.block_size {
            return Err(Error::malformed(format!(
                "block size {} exceeds requested {}",
                self.block_size, request.block_size
            )));
        }
        Ok(())
    }

    /// First counter past the block.
    pub const fn end_exclusive(&self) -> u64 {
        self.start_counter_inclusive + self.block_size
    }

    pub const fn contains(&self, counter: u64) -> bool {
        counter >= self.start_counter_inclusive && counter < self.end_exclusive()
    }

    /// Returns `true` if both blocks share a uniqueness domain and their
    /// ranges intersect.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.scope_name == other.scope_name
            && self.sequence_name == other.sequence_name
            && self.authority == other.authority
            && self.era == other.era
            && self.start_counter_inclusive < other.end_exclusive()
            && other.start_counter_inclusive < self.end_exclusive()
    }

    /// The id at `offset` inside the block, or `None` past its end.
    pub fn gdid_at(&self, offset: u64) -> Option<Gdid> {
        (offset < self.block_size).then(|| {
            Gdid::new_unchecked(self.era, self.authority, self.start_counter_inclusive + offset)
        })
    }
}
